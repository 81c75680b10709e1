//! Error types for face blurring operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for face blurring operations
pub type Result<T> = std::result::Result<T, FaceBlurError>;

/// Error taxonomy for the acquisition, selection and compositing pipeline
#[derive(Error, Debug)]
pub enum FaceBlurError {
    /// The input image does not exist
    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input/output errors (permission denied, short reads, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decode/encode errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// The face detector could not produce candidates
    #[error("Face detection failed: {0}")]
    DetectorFailure(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading, lookup or integrity errors
    #[error("Model error: {0}")]
    Model(String),

    /// The blurred result could not be written
    #[error("Failed to write output '{}': {reason}", .path.display())]
    OutputWriteFailure { path: PathBuf, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Windowing substrate errors
    #[error("Display error: {0}")]
    Display(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FaceBlurError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new detector failure
    pub fn detector<S: Into<String>>(msg: S) -> Self {
        Self::DetectorFailure(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new display error
    pub fn display<S: Into<String>>(msg: S) -> Self {
        Self::Display(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an output write failure for `path`
    pub fn output_write<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::OutputWriteFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error with the underlying cause appended
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = FaceBlurError::invalid_config("test config error");
        assert!(matches!(err, FaceBlurError::InvalidConfig(_)));

        let err = FaceBlurError::detector("session exploded");
        assert!(matches!(err, FaceBlurError::DetectorFailure(_)));
    }

    #[test]
    fn test_error_display() {
        let err = FaceBlurError::InputNotFound(PathBuf::from("missing.jpg"));
        assert_eq!(err.to_string(), "Input image not found: missing.jpg");

        let err = FaceBlurError::output_write("/ro/out.png", "permission denied");
        assert_eq!(
            err.to_string(),
            "Failed to write output '/ro/out.png': permission denied"
        );
    }

    #[test]
    fn test_contextual_errors() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = FaceBlurError::file_io_error("read regions", Path::new("/tmp/faces.json"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("read regions"));
        assert!(error_string.contains("/tmp/faces.json"));

        let err = FaceBlurError::config_value_error("kernel size", 0, "1-255", Some(30));
        let error_string = err.to_string();
        assert!(error_string.contains("kernel size"));
        assert!(error_string.contains("1-255"));
        assert!(error_string.contains("Recommended: 30"));
    }
}
