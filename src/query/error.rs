//! Query error types
//!
//! Unknown targets, inverted ranges and a missing recording are not errors:
//! they resolve to empty results. What remains are recordings that cannot
//! be read and requests that cannot be understood.

use crate::index::IndexError;
use crate::recording::RecordingError;
use crate::session::SessionError;
use thiserror::Error;

/// Errors that can occur during search and query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// The current recording could not be parsed
    #[error(transparent)]
    Recording(#[from] RecordingError),

    /// The current recording could not be opened
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Request body is well-formed JSON but not a valid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected failure while executing
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IndexError> for QueryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Recording(e) => QueryError::Recording(e),
            IndexError::Session(e) => QueryError::Session(e),
            IndexError::Internal(msg) => QueryError::Internal(msg),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
