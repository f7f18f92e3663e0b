//! Persistent key/value storage for cache blobs
//!
//! A `CacheStore` holds one serialized JSON blob per key. `FileStore` keeps
//! each blob as a file in the XDG cache directory, `MemoryStore` keeps them in
//! a map for tests. `JsonStore` sits on top of either and does the
//! (de)serialization, absorbing every failure so that storage stays advisory.

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Raw blob storage keyed by name
pub trait CacheStore: Send + Sync {
    /// Returns the stored blob, or `None` if absent or unreadable
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous blob
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    /// Removes `key`; absent keys are not an error
    fn delete(&self, key: &str) -> io::Result<()>;
}

/// Stores blobs as JSON files on disk
///
/// Uses `~/.cache/leadsync/` on Linux, or the equivalent XDG path on other
/// platforms.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "leadsync")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the blob file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.cache_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.ensure_dir()?;
        fs::write(self.cache_path(key), value)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.cache_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Keeps blobs in memory; used by tests and when no cache directory exists
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        blobs.remove(key);
        Ok(())
    }
}

/// Typed JSON access over a `CacheStore`
///
/// Reads never fail: a missing key, malformed JSON or a backend error all
/// come back as `None`. Writes and deletes log failures and carry on.
#[derive(Clone)]
pub struct JsonStore {
    inner: Arc<dyn CacheStore>,
}

impl JsonStore {
    pub fn new(store: impl CacheStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    pub fn from_shared(inner: Arc<dyn CacheStore>) -> Self {
        Self { inner }
    }

    /// Uses the on-disk store when a cache directory exists, memory otherwise
    pub fn open_default() -> Self {
        match FileStore::new() {
            Some(store) => Self::new(store),
            None => {
                tracing::warn!("no cache directory available, caching in memory only");
                Self::new(MemoryStore::new())
            }
        }
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.inner.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable cache blob");
                None
            }
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to serialize cache blob");
                return;
            }
        };
        if let Err(e) = self.inner.set(key, &json) {
            tracing::warn!(key, error = %e, "failed to write cache blob");
        }
    }

    pub fn delete(&self, key: &str) {
        if let Err(e) = self.inner.delete(key) {
            tracing::warn!(key, error = %e, "failed to delete cache blob");
        }
    }

    /// Whether a blob is present, regardless of whether it parses
    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).is_some()
    }
}

impl std::fmt::Debug for JsonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore").finish_non_exhaustive()
    }
}
