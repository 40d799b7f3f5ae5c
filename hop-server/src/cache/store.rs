//! Key/value backends for the TTL cache.
//!
//! Backends only store and return entries; expiry is decided by
//! [`TtlCache`](super::TtlCache). Every write replaces the whole value for
//! a key, so interleaved searches sharing a store never merge partial
//! updates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use moka::sync::Cache as MokaCache;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::CacheError;

/// A cached payload and when it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached value.
    pub payload: serde_json::Value,
    /// When the entry was written.
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// An entry written now.
    pub fn now(payload: serde_json::Value) -> Self {
        Self {
            payload,
            stored_at: Utc::now(),
        }
    }
}

/// Storage backend for cache entries.
pub trait KeyValueStore: Send + Sync {
    /// Read an entry.
    fn load(&self, key: &str) -> Option<CacheEntry>;

    /// Write an entry, replacing any previous value.
    fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Delete an entry. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Delete several entries at once.
    fn remove_many(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// All keys currently stored.
    fn keys(&self) -> Vec<String>;
}

/// In-memory store backed by an unbounded moka cache.
///
/// Entries stay until removed; expired ones are swept by
/// [`TtlCache::purge_expired`](super::TtlCache::purge_expired).
pub struct MemoryStore {
    entries: MokaCache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: MokaCache::builder().build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key)
    }

    fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.invalidate(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.as_ref().clone()).collect()
    }
}

/// Store persisted to a single JSON file.
///
/// The whole map is kept in memory and written through to disk on every
/// change, so results survive restarts the way the browser's local storage
/// does.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FileStore {
    /// Open (or create on first write) the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache file");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// Get the cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-written
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                message: format!("failed to create cache directory: {e}"),
            })?;
        }

        let json = serde_json::to_string(entries).map_err(|e| CacheError::Serialization {
            message: format!("failed to serialize cache: {e}"),
        })?;

        std::fs::write(&self.path, json).map_err(|e| CacheError::Io {
            message: format!("failed to write cache file: {e}"),
        })
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    fn store(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), entry);
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.lock();
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn memory_store_replaces_and_removes() {
        let store = MemoryStore::new();
        store.store("a", CacheEntry::now(json!(1))).unwrap();
        store.store("a", CacheEntry::now(json!(2))).unwrap();
        assert_eq!(store.load("a").unwrap().payload, json!(2));

        store.remove("a").unwrap();
        assert!(store.load("a").is_none());
        store.remove("missing").unwrap();
    }

    #[test]
    fn memory_store_lists_keys() {
        let store = MemoryStore::new();
        store.store("x", CacheEntry::now(json!("x"))).unwrap();
        store.store("y", CacheEntry::now(json!("y"))).unwrap();
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, ["x", "y"]);
    }

    #[test]
    fn memory_store_keeps_accepting_writes_when_large() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            store
                .store(&format!("flights:AAA-BBB-{i}"), CacheEntry::now(json!([])))
                .unwrap();
        }
        for i in 0..20 {
            let key = format!("itinerary:new{i}");
            store.store(&key, CacheEntry::now(json!("Refresh"))).unwrap();
            store.entries.run_pending_tasks();
            assert!(store.load(&key).is_some(), "{key} was dropped");
        }
        assert_eq!(store.keys().len(), 1020);
    }

    #[test]
    fn file_store_remove_many_persists_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path);
        for key in ["a", "b", "c"] {
            store.store(key, CacheEntry::now(json!(1))).unwrap();
        }
        store
            .remove_many(&["a".to_string(), "c".to_string(), "missing".to_string()])
            .unwrap();

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.keys(), ["b"]);
    }

    #[test]
    fn file_store_persists_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path);
        store.store("flights:BUD-LTN-2025-03-01", CacheEntry::now(json!([]))).unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(
            reopened.load("flights:BUD-LTN-2025-03-01").unwrap().payload,
            json!([])
        );
    }

    #[test]
    fn file_store_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path);
        store.store("k", CacheEntry::now(json!(true))).unwrap();
        store.remove("k").unwrap();

        assert!(FileStore::open(&path).load("k").is_none());
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("cache.json");

        let store = FileStore::open(&path);
        store.store("k", CacheEntry::now(json!(1))).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_store_ignores_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::open(&path);
        assert!(store.keys().is_empty());

        store.store("k", CacheEntry::now(json!(1))).unwrap();
        assert!(FileStore::open(&path).load("k").is_some());
    }
}
