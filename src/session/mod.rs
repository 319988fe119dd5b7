//! Recording Session
//!
//! Keeps uploaded recordings in a directory and remembers which one is
//! "current". The index layer only sees the [`RecordingSource`] trait:
//!
//! - `current_selection()` names the current recording and its generation
//! - `current_recording_stream()` opens it for parsing
//! - `subscribe()` delivers a [`RecordingChange`] whenever it is replaced
//!
//! Generations increase on every select, overwrite of the current file, or
//! deletion of it, so a cached index can be checked with one comparison.

mod error;
mod store;

pub use error::{SessionError, SessionResult};
pub use store::{validate_name, RecordingEntry, RecordingStore};

use async_trait::async_trait;
use serde::Serialize;
use std::io::Read;
use tokio::sync::broadcast;

/// The current recording and the generation it was selected at
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub name: String,
    pub generation: u64,
}

/// Change notification broadcast to index watchers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingChange {
    /// A recording was selected as current
    Selected(Selection),
    /// The current recording's file was overwritten
    Replaced(Selection),
    /// The current recording was deleted
    Cleared { generation: u64 },
}

impl RecordingChange {
    pub fn generation(&self) -> u64 {
        match self {
            RecordingChange::Selected(s) | RecordingChange::Replaced(s) => s.generation,
            RecordingChange::Cleared { generation } => *generation,
        }
    }
}

/// Readable bytes of the current recording
pub struct RecordingStream {
    pub selection: Selection,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for RecordingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStream")
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

/// Source of the current recording, consumed by the index manager
#[async_trait]
pub trait RecordingSource: Send + Sync {
    /// Current selection, if any
    async fn current_selection(&self) -> Option<Selection>;

    /// Open the current recording
    ///
    /// Fails with `NoCurrentRecording` when nothing is selected.
    async fn current_recording_stream(&self) -> SessionResult<RecordingStream>;

    /// Receive a notification each time the current recording changes
    fn subscribe(&self) -> broadcast::Receiver<RecordingChange>;
}
