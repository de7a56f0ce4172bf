// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the masking library.

use std::fmt;

/// Result type alias for masking operations.
pub type Result<T> = std::result::Result<T, MaskingError>;

/// Main error type for the masking library.
///
/// Detection misses, incomplete landmark derivations and degenerate mask
/// rectangles are not errors: they are absorbed by the stage that meets them.
#[derive(Debug)]
pub enum MaskingError {
    /// Error loading an ONNX model.
    ModelLoadError(String),
    /// Error during model inference.
    InferenceError(String),
    /// Error processing images.
    ImageError(String),
    /// Invalid configuration provided.
    ConfigError(String),
    /// IO error (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
    /// A frame or face file could not be read.
    InputUnavailable(String),
    /// Error reading or writing a JSON report.
    ReportError(String),
    /// Video decoding or encoding error.
    VideoError(String),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl fmt::Display for MaskingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoadError(msg) => write!(f, "Model load error: {msg}"),
            Self::InferenceError(msg) => write!(f, "Inference error: {msg}"),
            Self::ImageError(msg) => write!(f, "Image error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::InputUnavailable(msg) => write!(f, "Input unavailable: {msg}"),
            Self::ReportError(msg) => write!(f, "Report error: {msg}"),
            Self::VideoError(msg) => write!(f, "Video error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for MaskingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaskingError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for MaskingError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageError(err.to_string())
    }
}

impl From<serde_json::Error> for MaskingError {
    fn from(err: serde_json::Error) -> Self {
        Self::ReportError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MaskingError::ModelLoadError("test".to_string());
        assert_eq!(err.to_string(), "Model load error: test");

        let err = MaskingError::InputUnavailable("frame.jpg".to_string());
        assert_eq!(err.to_string(), "Input unavailable: frame.jpg");
    }

    #[test]
    fn test_json_error_maps_to_report_error() {
        let err: MaskingError = serde_json::from_str::<Vec<u32>>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, MaskingError::ReportError(_)));
    }
}
