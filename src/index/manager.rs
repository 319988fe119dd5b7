//! Index Manager - publishes the index of the current recording
//!
//! Readers clone an `Arc<IndexSnapshot>` out of a read lock and then work
//! without any lock held. A rebuild parses on a blocking worker and only
//! takes the write lock to swap the new snapshot in:
//!
//! ```text
//! snapshot() ──▶ selection generation == published? ──yes──▶ Arc clone
//!                         │ no
//!                         ▼
//!            rebuild lock ─▶ open stream ─▶ spawn_blocking(parse + build)
//!                                                   │
//!                                   write lock ◀────┘ swap
//! ```
//!
//! A failed rebuild leaves the previous snapshot published. The failure is
//! kept apart from the rebuild lock so health checks never wait on a parse.

use crate::index::error::{IndexError, IndexResult};
use crate::index::recording_index::RecordingIndex;
use crate::recording::{Recording, RecordingError};
use crate::session::{RecordingSource, RecordingStream, SessionError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// An immutable index tied to one recording generation
#[derive(Debug)]
pub struct IndexSnapshot {
    /// Name of the recording the index was built from
    pub recording: String,
    /// Session generation at which the recording was opened
    pub generation: u64,
    pub index: RecordingIndex,
}

/// A generation whose recording failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBuild {
    pub generation: u64,
    pub message: String,
}

/// Owns the shared "current index" reference
pub struct IndexManager {
    source: Arc<dyn RecordingSource>,
    published: RwLock<Option<Arc<IndexSnapshot>>>,
    /// Serializes rebuilds
    rebuild: Mutex<()>,
    /// Last malformed generation
    failure: RwLock<Option<FailedBuild>>,
}

impl IndexManager {
    pub fn new(source: Arc<dyn RecordingSource>) -> Self {
        Self {
            source,
            published: RwLock::new(None),
            rebuild: Mutex::new(()),
            failure: RwLock::new(None),
        }
    }

    /// Snapshot for the current recording, rebuilding if it changed
    ///
    /// Returns `Ok(None)` when no recording is selected.
    pub async fn snapshot(&self) -> IndexResult<Option<Arc<IndexSnapshot>>> {
        let Some(selection) = self.source.current_selection().await else {
            self.clear().await;
            return Ok(None);
        };

        if let Some(snapshot) = self.published_at(selection.generation).await {
            return Ok(Some(snapshot));
        }

        self.rebuild().await
    }

    /// The published snapshot, without checking the session
    pub async fn published(&self) -> Option<Arc<IndexSnapshot>> {
        self.published.read().await.clone()
    }

    /// The failed build of the current selection, if any
    ///
    /// A failure recorded for an older generation, or while nothing is
    /// selected anymore, is stale and not reported.
    pub async fn last_failure(&self) -> Option<FailedBuild> {
        let generation = self.source.current_selection().await?.generation;
        self.failure
            .read()
            .await
            .as_ref()
            .filter(|f| f.generation == generation)
            .cloned()
    }

    async fn published_at(&self, generation: u64) -> Option<Arc<IndexSnapshot>> {
        self.published
            .read()
            .await
            .as_ref()
            .filter(|s| s.generation == generation)
            .cloned()
    }

    async fn clear(&self) {
        let mut published = self.published.write().await;
        if let Some(old) = published.take() {
            tracing::debug!(recording = %old.recording, generation = old.generation, "Index cleared");
        }
        drop(published);
        *self.failure.write().await = None;
    }

    /// Parse the current recording and publish its index
    pub async fn rebuild(&self) -> IndexResult<Option<Arc<IndexSnapshot>>> {
        let _rebuilding = self.rebuild.lock().await;

        // Someone else may have rebuilt while we waited for the lock
        let Some(selection) = self.source.current_selection().await else {
            self.clear().await;
            return Ok(None);
        };
        if let Some(snapshot) = self.published_at(selection.generation).await {
            return Ok(Some(snapshot));
        }
        {
            let mut failure = self.failure.write().await;
            if let Some(f) = failure.as_ref().filter(|f| f.generation == selection.generation) {
                return Err(RecordingError::Malformed(f.message.clone()).into());
            }
            // An older generation's failure no longer applies
            *failure = None;
        }

        let RecordingStream { selection, reader } =
            match self.source.current_recording_stream().await {
                Ok(stream) => stream,
                Err(SessionError::NoCurrentRecording) => {
                    self.clear().await;
                    return Ok(None);
                }
                // Deleted between selection and open
                Err(SessionError::NotFound(name)) => {
                    tracing::debug!(recording = %name, "Selected recording is gone");
                    self.clear().await;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

        let started = Instant::now();
        let built = tokio::task::spawn_blocking(move || {
            let recording = Recording::from_reader(reader)?;
            RecordingIndex::from_recording(&recording)
        })
        .await
        .map_err(|e| IndexError::Internal(e.to_string()))?;

        match built {
            Ok(index) => {
                let snapshot = Arc::new(IndexSnapshot {
                    recording: selection.name,
                    generation: selection.generation,
                    index,
                });
                *self.published.write().await = Some(Arc::clone(&snapshot));

                tracing::info!(
                    recording = %snapshot.recording,
                    generation = snapshot.generation,
                    events = snapshot.index.event_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Index published"
                );
                Ok(Some(snapshot))
            }
            Err(e) => {
                tracing::warn!(
                    recording = %selection.name,
                    generation = selection.generation,
                    error = %e,
                    "Index rebuild failed, keeping previous index"
                );
                if let RecordingError::Malformed(message) = &e {
                    *self.failure.write().await = Some(FailedBuild {
                        generation: selection.generation,
                        message: message.clone(),
                    });
                }
                Err(e.into())
            }
        }
    }

    /// Rebuild eagerly whenever the session reports a change
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut changes = self.source.subscribe();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        tracing::debug!(generation = change.generation(), "Recording changed");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Watcher lagged behind recording changes");
                    }
                    Err(RecvError::Closed) => break,
                }

                if let Err(e) = manager.snapshot().await {
                    tracing::warn!(error = %e, "Background index rebuild failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Event, RecordingWriter};
    use crate::session::RecordingStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn recording_with_prefix(prefix: &str, events: usize) -> Vec<u8> {
        let events: Vec<Event> = (0..events)
            .map(|i| {
                Event::at_millis(format!("{}.load", prefix), i as i64)
                    .field("value", i as f64)
                    .field("other", 1.0)
            })
            .collect();
        RecordingWriter::from_events(0, &events).unwrap().finish()
    }

    async fn create_manager() -> (Arc<IndexManager>, Arc<RecordingStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RecordingStore::open(dir.path()).await.unwrap());
        let manager = Arc::new(IndexManager::new(store.clone()));
        (manager, store, dir)
    }

    #[tokio::test]
    async fn test_no_selection() {
        let (manager, _store, _dir) = create_manager().await;
        assert!(manager.snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reused_until_generation_changes() {
        let (manager, store, _dir) = create_manager().await;
        store.save("a.jfr", &recording_with_prefix("a", 3), false).await.unwrap();
        store.select("a.jfr").await.unwrap();

        let first = manager.snapshot().await.unwrap().unwrap();
        let second = manager.snapshot().await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.index.event_count(), 3);

        store.save("a.jfr", &recording_with_prefix("a", 5), true).await.unwrap();
        let third = manager.snapshot().await.unwrap().unwrap();
        assert!(third.generation > first.generation);
        assert_eq!(third.index.event_count(), 5);
    }

    #[tokio::test]
    async fn test_malformed_recording_publishes_nothing() {
        let (manager, store, _dir) = create_manager().await;
        let bytes = recording_with_prefix("a", 3);
        store.save("broken.jfr", &bytes[..20], false).await.unwrap();
        let selection = store.select("broken.jfr").await.unwrap();

        let err = manager.snapshot().await.unwrap_err();
        assert!(matches!(err, IndexError::Recording(ref e) if e.is_malformed()));
        assert!(manager.published().await.is_none());

        // The same broken generation is not parsed again
        let failure = manager.last_failure().await.unwrap();
        assert_eq!(failure.generation, selection.generation);
        assert!(manager.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let (manager, store, _dir) = create_manager().await;
        store.save("a.jfr", &recording_with_prefix("a", 2), false).await.unwrap();
        store.select("a.jfr").await.unwrap();
        let good = manager.snapshot().await.unwrap().unwrap();

        store.save("a.jfr", b"garbage", true).await.unwrap();
        assert!(manager.snapshot().await.is_err());

        let published = manager.published().await.unwrap();
        assert!(Arc::ptr_eq(&published, &good));
    }

    #[tokio::test]
    async fn test_deleting_current_clears_snapshot() {
        let (manager, store, _dir) = create_manager().await;
        store.save("a.jfr", &recording_with_prefix("a", 2), false).await.unwrap();
        store.select("a.jfr").await.unwrap();
        assert!(manager.snapshot().await.unwrap().is_some());

        store.delete("a.jfr").await.unwrap();
        assert!(manager.snapshot().await.unwrap().is_none());
        assert!(manager.published().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_forgotten_after_delete() {
        let (manager, store, _dir) = create_manager().await;
        store.save("broken.jfr", b"FLR\0 truncated", false).await.unwrap();
        store.select("broken.jfr").await.unwrap();
        assert!(manager.snapshot().await.is_err());
        assert!(manager.last_failure().await.is_some());

        store.delete("broken.jfr").await.unwrap();
        assert!(manager.last_failure().await.is_none());
        assert!(manager.snapshot().await.unwrap().is_none());
        assert!(manager.failure.read().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_forgotten_after_new_selection() {
        let (manager, store, _dir) = create_manager().await;
        store.save("broken.jfr", b"garbage", false).await.unwrap();
        store.save("a.jfr", &recording_with_prefix("a", 2), false).await.unwrap();
        store.select("broken.jfr").await.unwrap();
        assert!(manager.snapshot().await.is_err());

        store.select("a.jfr").await.unwrap();
        assert!(manager.last_failure().await.is_none());
        assert_eq!(manager.snapshot().await.unwrap().unwrap().index.event_count(), 2);
    }

    #[tokio::test]
    async fn test_last_failure_does_not_wait_for_rebuild() {
        let (manager, store, _dir) = create_manager().await;
        store.save("broken.jfr", b"garbage", false).await.unwrap();
        store.select("broken.jfr").await.unwrap();
        assert!(manager.snapshot().await.is_err());

        let _rebuilding = manager.rebuild.lock().await;
        let failure = tokio::time::timeout(Duration::from_secs(1), manager.last_failure())
            .await
            .unwrap();
        assert!(failure.is_some());
    }

    #[tokio::test]
    async fn test_selected_file_removed_behind_store_is_empty() {
        let (manager, store, _dir) = create_manager().await;
        store.save("a.jfr", &recording_with_prefix("a", 2), false).await.unwrap();
        store.select("a.jfr").await.unwrap();
        tokio::fs::remove_file(store.dir().join("a.jfr")).await.unwrap();

        assert!(manager.snapshot().await.unwrap().is_none());
        assert!(manager.published().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_see_whole_snapshots_during_rebuilds() {
        let (manager, store, _dir) = create_manager().await;
        store.save("a.jfr", &recording_with_prefix("a", 500), false).await.unwrap();
        store.save("b.jfr", &recording_with_prefix("b", 700), false).await.unwrap();
        store.select("a.jfr").await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    let name = if i % 2 == 0 { "b.jfr" } else { "a.jfr" };
                    store.select(name).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let manager = manager.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let Some(snapshot) = manager.snapshot().await.unwrap() else {
                        continue;
                    };
                    let prefix = &snapshot.recording[..1];
                    let expected = if prefix == "a" { 500 } else { 700 };
                    assert_eq!(snapshot.index.event_count(), expected);
                    assert!(snapshot
                        .index
                        .targets()
                        .all(|t| t.starts_with(&format!("{}.", prefix))));
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_watcher_rebuilds_on_change() {
        let (manager, store, _dir) = create_manager().await;
        let watcher = manager.spawn_watcher();

        store.save("a.jfr", &recording_with_prefix("a", 4), false).await.unwrap();
        let selection = store.select("a.jfr").await.unwrap();

        let mut published = None;
        for _ in 0..200 {
            published = manager.published().await;
            if published.as_ref().map(|s| s.generation) == Some(selection.generation) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(published.unwrap().index.event_count(), 4);

        watcher.abort();
    }
}
