//! Recording error types
//!
//! Defines all errors that can occur while reading or writing recordings.

use thiserror::Error;

/// Errors that can occur in the recording layer
#[derive(Error, Debug)]
pub enum RecordingError {
    /// The byte stream is not a valid recording container
    #[error("Malformed recording: {0}")]
    Malformed(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writer was given values that do not match the declared event type
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

impl RecordingError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        RecordingError::Malformed(msg.into())
    }

    /// True for container-format errors
    pub fn is_malformed(&self) -> bool {
        matches!(self, RecordingError::Malformed(_))
    }
}

/// Result type alias for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecordingError::malformed("bad magic");
        assert_eq!(err.to_string(), "Malformed recording: bad magic");
        assert!(err.is_malformed());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RecordingError = io_err.into();
        assert!(matches!(err, RecordingError::Io(_)));
        assert!(!err.is_malformed());
    }
}
