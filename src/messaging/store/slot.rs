//! Key-value slots backing the local fallback store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::messaging::core::errors::MessagingResult;

/// Durable, synchronous storage for whole documents addressed by key.
pub trait StorageSlot: Send + Sync {
    /// Read the document stored under `key`, or `None` if absent.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be read.
    fn read(&self, key: &str) -> MessagingResult<Option<String>>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be written.
    fn write(&self, key: &str, value: &str) -> MessagingResult<()>;
}

/// Slot storing each key as `<dir>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Create a slot rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `key`.
    #[must_use]
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageSlot for FileSlot {
    fn read(&self, key: &str) -> MessagingResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> MessagingResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        debug!(path = %path.display(), bytes = value.len(), "Wrote fallback document");
        Ok(())
    }
}

/// In-process slot. Clones share the same entries, like two browser tabs
/// sharing one storage area.
#[derive(Clone, Debug, Default)]
pub struct MemorySlot {
    entries: Arc<DashMap<String, String>>,
}

impl MemorySlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw document, bypassing any serialization.
    pub fn put_raw(&self, key: &str, value: impl Into<String>) {
        self.entries.insert(key.to_string(), value.into());
    }
}

impl StorageSlot for MemorySlot {
    fn read(&self, key: &str) -> MessagingResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> MessagingResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
