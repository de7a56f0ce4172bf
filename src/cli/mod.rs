// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module.
//!
//! Argument parsing, console logging and the `mask` and `register` commands.

// Modules
/// CLI arguments.
pub mod args;

/// Console logging macros.
pub mod logging;

/// Masking command.
pub mod mask;

/// Reference registration command.
pub mod register;
