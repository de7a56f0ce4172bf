// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;
use exposure_mask::cli::args::{Cli, Commands};
use exposure_mask::cli::{mask, register};

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Mask(args) => mask::run_mask(args),
        Commands::Register(args) => register::run_register(args),
    }
}
