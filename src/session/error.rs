//! Session error types

use thiserror::Error;

/// Errors from the recording store
#[derive(Error, Debug)]
pub enum SessionError {
    /// No stored recording has this name
    #[error("Recording not found: {0}")]
    NotFound(String),

    /// Nothing has been selected yet, or the selection was deleted
    #[error("No current recording selected")]
    NoCurrentRecording,

    /// Name is empty, hidden or contains path components
    #[error("Invalid recording name: {0:?}")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// True when the caller asked for something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SessionError::NotFound(_) | SessionError::NoCurrentRecording
        )
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
