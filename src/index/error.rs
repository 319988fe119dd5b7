//! Index error types

use crate::recording::RecordingError;
use crate::session::SessionError;
use thiserror::Error;

/// Errors raised while (re)building the current index
#[derive(Error, Debug)]
pub enum IndexError {
    /// The current recording could not be parsed
    #[error(transparent)]
    Recording(#[from] RecordingError),

    /// The current recording could not be opened
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The build task panicked or was cancelled
    #[error("Index build failed: {0}")]
    Internal(String),
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;
