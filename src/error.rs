//! Crate-wide error type
//!
//! Every fallible operation in the unlearning pipeline returns [`Result`].
//! Variants carry enough context to act on the failure without reading the
//! source.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias for desaprender operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the unlearning engine and its collaborators
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration (settings, checkpoint config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tensor length or shape does not match what the operation expects
    #[error("Shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid input data (labels out of range, ragged features)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A loss or gradient became NaN or infinite
    #[error("Non-finite {what} encountered: {value}")]
    NonFinite { what: String, value: f32 },

    /// An attack split has no examples
    #[error("Split '{0}' is empty; membership inference needs at least one loss per split")]
    EmptySplit(String),

    /// Checkpoint file could not be found
    #[error("Checkpoint not found: {}", path.display())]
    CheckpointNotFound { path: PathBuf },

    /// Serialization or deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Experiment tracking failure
    #[error("Tracking error: {0}")]
    Tracking(#[from] crate::tracking::TrackingError),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON: {e}"))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization(format!("YAML: {e}"))
    }
}

impl Error {
    /// Shorthand for a shape mismatch on a flat length
    pub(crate) fn length(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            name: name.into(),
            expected: vec![expected],
            actual: vec![actual],
        }
    }

    /// Check if this error was caused by user-supplied configuration
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::CheckpointNotFound { .. } | Self::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_shape_mismatch() {
        let err = Error::length("layers.0.weight", 6, 4);
        let msg = err.to_string();
        assert!(msg.contains("layers.0.weight"));
        assert!(msg.contains("[6]"));
        assert!(msg.contains("[4]"));
    }

    #[test]
    fn test_error_from_json() {
        let parse: std::result::Result<u32, _> = serde_json::from_str("not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_user_errors() {
        assert!(Error::Config("missing".into()).is_user_error());
        assert!(!Error::EmptySplit("forget".into()).is_user_error());
    }
}
