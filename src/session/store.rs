//! Directory-backed recording store

use crate::session::error::{SessionError, SessionResult};
use crate::session::{RecordingChange, RecordingSource, RecordingStream, Selection};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, Mutex, RwLock};

/// Capacity of the change notification channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Directory name used under the system temp dir by default
pub const DEFAULT_UPLOAD_DIR: &str = "jfr-file-uploads";

/// One stored recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingEntry {
    pub name: String,
    pub size_bytes: u64,
    pub current: bool,
}

/// Stores uploaded recordings and tracks the current one
pub struct RecordingStore {
    dir: PathBuf,
    current: RwLock<Option<Selection>>,
    generation: AtomicU64,
    changes: broadcast::Sender<RecordingChange>,
    /// Serializes directory mutations and selection
    files: Mutex<()>,
}

/// Check a client-supplied file name
///
/// Names must be plain file names: non-empty, no separators, not `.`/`..`
/// and not hidden (temporary upload files start with a dot).
pub fn validate_name(name: &str) -> SessionResult<()> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(|c| matches!(c, '/' | '\\' | '\0'))
        || Path::new(name).file_name().map_or(true, |n| n != name);

    if invalid {
        return Err(SessionError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl RecordingStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> SessionResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        tracing::info!(dir = %dir.display(), "Recording store opened");

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            dir,
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            changes,
            files: Mutex::new(()),
        })
    }

    /// Default upload directory: `$TMPDIR/jfr-file-uploads`
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_UPLOAD_DIR)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn notify(&self, change: RecordingChange) {
        // No receivers is fine; nothing is watching yet
        let _ = self.changes.send(change);
    }

    /// Store a recording, returning the name it was saved under
    ///
    /// Without `overwrite` an existing name gets a numeric suffix
    /// (`profile_1.jfr`, `profile_2.jfr`, ...). Overwriting the current
    /// recording bumps the generation.
    pub async fn save(&self, name: &str, bytes: &[u8], overwrite: bool) -> SessionResult<String> {
        validate_name(name)?;
        let _guard = self.files.lock().await;

        let name = if overwrite {
            name.to_string()
        } else {
            self.unique_name(name).await?
        };

        // Write then rename so readers never observe a partial file
        let tmp = self.path_of(&format!(".{}.partial", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.path_of(&name)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::info!(name = %name, bytes = bytes.len(), overwrite, "Recording saved");

        let mut current = self.current.write().await;
        if let Some(selection) = current.as_mut().filter(|s| s.name == name) {
            selection.generation = self.next_generation();
            let change = RecordingChange::Replaced(selection.clone());
            drop(current);
            self.notify(change);
        }

        Ok(name)
    }

    async fn unique_name(&self, name: &str) -> SessionResult<String> {
        if !self.exists(name).await? {
            return Ok(name.to_string());
        }

        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 1u64;
        loop {
            let candidate = format!("{}_{}{}", stem, n, ext);
            if !self.exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn exists(&self, name: &str) -> SessionResult<bool> {
        match tokio::fs::metadata(self.path_of(name)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored recordings sorted by name
    pub async fn list(&self) -> SessionResult<Vec<RecordingEntry>> {
        let current = self.current().await;
        let mut entries = Vec::new();

        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            entries.push(RecordingEntry {
                current: current.as_deref() == Some(name.as_str()),
                name,
                size_bytes: meta.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Make a stored recording current
    pub async fn select(&self, name: &str) -> SessionResult<Selection> {
        validate_name(name)?;
        // Held until `current` is written so a delete cannot slip in between
        let _guard = self.files.lock().await;
        if !self.exists(name).await? {
            return Err(SessionError::NotFound(name.to_string()));
        }

        let selection = Selection {
            name: name.to_string(),
            generation: self.next_generation(),
        };
        *self.current.write().await = Some(selection.clone());

        tracing::info!(name = %name, generation = selection.generation, "Recording selected");
        self.notify(RecordingChange::Selected(selection.clone()));
        Ok(selection)
    }

    /// Name of the current recording
    pub async fn current(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.name.clone())
    }

    /// Delete a stored recording; deleting the current one clears the selection
    pub async fn delete(&self, name: &str) -> SessionResult<()> {
        validate_name(name)?;
        let _guard = self.files.lock().await;

        match tokio::fs::remove_file(self.path_of(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(name = %name, "Recording deleted");
        self.clear_if_current(|current| current == name).await;
        Ok(())
    }

    /// Delete every stored recording, returning the deleted names
    pub async fn delete_all(&self) -> SessionResult<Vec<String>> {
        let entries = self.list().await?;
        let _guard = self.files.lock().await;

        let mut deleted = Vec::with_capacity(entries.len());
        for entry in entries {
            match tokio::fs::remove_file(self.path_of(&entry.name)).await {
                Ok(()) => deleted.push(entry.name),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(count = deleted.len(), "All recordings deleted");
        self.clear_if_current(|_| true).await;
        Ok(deleted)
    }

    async fn clear_if_current(&self, matches: impl Fn(&str) -> bool) {
        let mut current = self.current.write().await;
        if current.as_ref().map_or(false, |s| matches(&s.name)) {
            *current = None;
            let generation = self.next_generation();
            drop(current);
            self.notify(RecordingChange::Cleared { generation });
        }
    }
}

#[async_trait]
impl RecordingSource for RecordingStore {
    async fn current_selection(&self) -> Option<Selection> {
        self.current.read().await.clone()
    }

    async fn current_recording_stream(&self) -> SessionResult<RecordingStream> {
        let selection = self
            .current_selection()
            .await
            .ok_or(SessionError::NoCurrentRecording)?;

        let file = match tokio::fs::File::open(self.path_of(&selection.name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(selection.name));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(RecordingStream {
            selection,
            reader: Box::new(file.into_std().await),
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordingChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    async fn create_store() -> (RecordingStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RecordingStore::open(dir.path().join("uploads")).await.unwrap();
        (store, dir)
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("profile.jfr").is_ok());
        assert!(validate_name("my recording 1.jfr").is_ok());

        for bad in ["", ".", "..", "../x.jfr", "a/b.jfr", "a\\b.jfr", ".hidden"] {
            assert!(validate_name(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[tokio::test]
    async fn test_save_and_list() {
        let (store, _dir) = create_store().await;

        store.save("b.jfr", b"bbb", false).await.unwrap();
        store.save("a.jfr", b"a", false).await.unwrap();

        let entries = store.list().await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.jfr", "b.jfr"]);
        assert_eq!(entries[1].size_bytes, 3);
        assert!(entries.iter().all(|e| !e.current));
    }

    #[tokio::test]
    async fn test_save_without_overwrite_picks_unique_name() {
        let (store, _dir) = create_store().await;

        assert_eq!(store.save("p.jfr", b"1", false).await.unwrap(), "p.jfr");
        assert_eq!(store.save("p.jfr", b"2", false).await.unwrap(), "p_1.jfr");
        assert_eq!(store.save("p.jfr", b"3", false).await.unwrap(), "p_2.jfr");
        assert_eq!(store.save("p.jfr", b"4", true).await.unwrap(), "p.jfr");

        assert_eq!(store.list().await.unwrap().len(), 3);
        let content = tokio::fs::read(store.dir().join("p.jfr")).await.unwrap();
        assert_eq!(content, b"4");
    }

    #[tokio::test]
    async fn test_select_and_stream() {
        let (store, _dir) = create_store().await;
        store.save("rec.jfr", b"payload", false).await.unwrap();

        assert!(matches!(
            store.current_recording_stream().await,
            Err(SessionError::NoCurrentRecording)
        ));

        let selection = store.select("rec.jfr").await.unwrap();
        assert_eq!(store.current().await.as_deref(), Some("rec.jfr"));

        let mut stream = store.current_recording_stream().await.unwrap();
        assert_eq!(stream.selection, selection);
        let mut content = Vec::new();
        stream.reader.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"payload");

        let listed = store.list().await.unwrap();
        assert!(listed[0].current);
    }

    #[tokio::test]
    async fn test_select_missing() {
        let (store, _dir) = create_store().await;
        let err = store.select("nope.jfr").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let (store, _dir) = create_store().await;
        let mut changes = store.subscribe();

        store.save("rec.jfr", b"v1", false).await.unwrap();
        let selected = store.select("rec.jfr").await.unwrap();
        store.save("rec.jfr", b"v2", true).await.unwrap();
        store.delete("rec.jfr").await.unwrap();

        assert_eq!(changes.recv().await.unwrap(), RecordingChange::Selected(selected.clone()));

        let replaced = changes.recv().await.unwrap();
        assert!(matches!(replaced, RecordingChange::Replaced(ref s) if s.name == "rec.jfr"));
        assert!(replaced.generation() > selected.generation);

        let cleared = changes.recv().await.unwrap();
        assert!(matches!(cleared, RecordingChange::Cleared { .. }));
        assert!(cleared.generation() > replaced.generation());
        assert_eq!(store.current().await, None);
    }

    #[tokio::test]
    async fn test_overwrite_other_file_keeps_generation() {
        let (store, _dir) = create_store().await;
        store.save("a.jfr", b"a", false).await.unwrap();
        store.save("b.jfr", b"b", false).await.unwrap();
        let selection = store.select("a.jfr").await.unwrap();

        store.save("b.jfr", b"bb", true).await.unwrap();
        assert_eq!(store.current_selection().await, Some(selection));
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let (store, _dir) = create_store().await;
        let err = store.delete("ghost.jfr").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_select_racing_delete_never_points_at_missing_file() {
        let (store, _dir) = create_store().await;
        let store = std::sync::Arc::new(store);

        for _ in 0..50 {
            store.save("a.jfr", b"a", true).await.unwrap();

            let selecting = {
                let store = store.clone();
                tokio::spawn(async move { store.select("a.jfr").await })
            };
            let deleting = {
                let store = store.clone();
                tokio::spawn(async move { store.delete("a.jfr").await })
            };
            let _ = selecting.await.unwrap();
            deleting.await.unwrap().unwrap();

            if store.current().await.is_some() {
                assert!(store.exists("a.jfr").await.unwrap());
            }
        }
    }

    #[tokio::test]
    async fn test_delete_all() {
        let (store, _dir) = create_store().await;
        store.save("a.jfr", b"a", false).await.unwrap();
        store.save("b.jfr", b"b", false).await.unwrap();
        store.select("b.jfr").await.unwrap();

        let deleted = store.delete_all().await.unwrap();
        assert_eq!(deleted, vec!["a.jfr".to_string(), "b.jfr".to_string()]);
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.current().await, None);
    }
}
