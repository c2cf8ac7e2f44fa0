//! Level completion lookups over a persistent key-value store.
//!
//! Games write a level's saved solution under `"{app}{level}"` once it is
//! solved. This module only reads those keys; a store that cannot be reached
//! reports every level as not done.

use crate::MAX_LEVEL;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String-keyed persistence, the equivalent of a browser profile's local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store persisted as a single JSON object file.
///
/// A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

/// Storage key for a level of an app.
pub fn level_key(app_name: &str, level: u32) -> String {
    format!("{}{}", app_name, level)
}

/// Read-only view of per-level completion.
pub struct ProgressStore<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> ProgressStore<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Whether `level` of `app_name` has been solved.
    ///
    /// Any store failure reads as "not done".
    pub fn is_level_complete(&self, app_name: &str, level: u32) -> bool {
        let key = level_key(app_name, level);
        match self.store.get(&key) {
            Ok(value) => value.is_some_and(|v| !v.is_empty()),
            Err(e) => {
                debug!("Cannot read progress key '{}': {}", key, e);
                false
            }
        }
    }

    /// All solved levels of `app_name`, ascending.
    pub fn completed_levels(&self, app_name: &str) -> Vec<u32> {
        (1..=MAX_LEVEL)
            .filter(|&level| self.is_level_complete(app_name, level))
            .collect()
    }
}
