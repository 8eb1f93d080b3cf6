//! Error types for upscaling operations

use thiserror::Error;

/// Result type alias for upscaling operations
pub type Result<T> = std::result::Result<T, UpscaleError>;

/// Error types for tiling, inference and image I/O
#[derive(Error, Debug)]
pub enum UpscaleError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The inference engine could not be initialized. Fatal for a whole run.
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// The inference engine failed for a tile (error, empty output or timeout)
    #[error("Inference error: {0}")]
    Inference(String),

    /// The inference engine returned a buffer with unexpected dimensions
    #[error("Shape mismatch: expected {expected_width}x{expected_height}, got {actual_width}x{actual_height}")]
    ShapeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    /// The input image could not be decoded
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// The output image could not be encoded or written
    #[error("Image encode error: {0}")]
    ImageEncode(String),

    /// Invalid configuration or geometry parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UpscaleError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model load error
    pub fn model_load<S: Into<String>>(msg: S) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new decode error
    pub fn image_decode<S: Into<String>>(msg: S) -> Self {
        Self::ImageDecode(msg.into())
    }

    /// Create a new encode error
    pub fn image_encode<S: Into<String>>(msg: S) -> Self {
        Self::ImageEncode(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a shape mismatch error from expected and actual dimensions
    #[must_use]
    pub fn shape_mismatch(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::ShapeMismatch {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }

    /// Create a network error carrying the underlying cause
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create inference error with backend and tile context
    pub fn inference_error_with_provider(provider: &str, operation: &str, error: &str) -> Self {
        Self::Inference(format!(
            "{} failed using '{}' backend: {}",
            operation, provider, error
        ))
    }

    /// Whether this error must abort a whole run rather than a single image
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelLoad(_) | Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = UpscaleError::invalid_config("test config error");
        assert!(matches!(err, UpscaleError::InvalidConfig(_)));

        let err = UpscaleError::inference("tile 3 failed");
        assert!(matches!(err, UpscaleError::Inference(_)));
    }

    #[test]
    fn test_error_display() {
        let err = UpscaleError::invalid_config("chunk size must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: chunk size must be positive"
        );

        let err = UpscaleError::shape_mismatch((128, 64), (126, 64));
        assert_eq!(err.to_string(), "Shape mismatch: expected 128x64, got 126x64");
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = UpscaleError::file_io_error("read image", Path::new("/data/in.png"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read image"));
        assert!(error_string.contains("/data/in.png"));

        let err = UpscaleError::config_value_error("jpeg_quality", 150, "0-100", Some(90));
        let error_string = err.to_string();
        assert!(error_string.contains("jpeg_quality"));
        assert!(error_string.contains("150"));
        assert!(error_string.contains("Recommended: 90"));

        let err = UpscaleError::inference_error_with_provider("onnx", "Tile inference", "OOM");
        let error_string = err.to_string();
        assert!(error_string.contains("onnx"));
        assert!(error_string.contains("Tile inference"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(UpscaleError::model_load("missing file").is_fatal());
        assert!(UpscaleError::Network("dns".into()).is_fatal());
        assert!(!UpscaleError::inference("tile").is_fatal());
        assert!(!UpscaleError::image_decode("bad header").is_fatal());
    }
}
