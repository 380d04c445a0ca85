//! Durable string key-value storage for user preferences.
//!
//! `FileStore` keeps every entry in one JSON object on disk; `MemoryStore`
//! is the in-process equivalent used by tests and ephemeral sessions.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::StorageError;

/// Minimal string-keyed persistence used by [`crate::Preferences`].
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON file store, e.g. `~/.config/kisan/preferences.json`.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "preferences.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<config_dir>/preferences.json`.
    pub fn in_dir(config_dir: &Path) -> Self {
        Self::new(config_dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents =
            fs::read_to_string(&self.path).map_err(|e| StorageError::Read(e.to_string()))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Write(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Write(e.to_string()))?;

        // Write to a sibling temp file and rename so readers never see a torn file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StorageError::Write(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Write(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)?;
        tracing::debug!("Stored preference {} at {:?}", key, self.path);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
            tracing::debug!("Removed preference {}", key);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }
}
