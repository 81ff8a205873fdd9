//! Backing Store Module
//!
//! Defines the capability the cache persists into, plus the built-in stores.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// == Store Error ==
/// Failure reported by a backing store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The write would push the store past its quota
    #[error("Quota exceeded: write needs {needed} bytes, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Persisted data could not be read back
    #[error("Corrupt store data: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

// == Backing Store Trait ==
/// A synchronous, capacity-limited string key-value store.
///
/// Keys are addressed positionally through `len`/`key_at` so callers can
/// enumerate everything the store holds, including keys the cache does not own.
pub trait BackingStore: Send + Sync {
    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Number of keys currently stored.
    fn len(&self) -> usize;

    /// Key at position `index`, or None when out of range.
    fn key_at(&self, index: usize) -> Option<String>;

    /// Every stored key, in `key_at` order.
    fn keys(&self) -> Vec<String> {
        (0..self.len()).filter_map(|i| self.key_at(i)).collect()
    }

    /// Removes several keys as one operation. Stores with a per-write cost
    /// override this to pay it once.
    fn remove_many(&mut self, keys: &[String]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Whether `err` means "out of space" for this store.
    fn is_capacity_error(&self, err: &StoreError) -> bool {
        matches!(err, StoreError::QuotaExceeded { .. })
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Store Kind ==
/// The flavours of backing store a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Survives restarts
    Durable,
    /// Lives as long as the process
    Session,
    /// Externally synchronized; only available when registered
    Synced,
}

impl StoreKind {
    /// Parses a requested kind. Unrecognized names select `Durable`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "session" => StoreKind::Session,
            "synced" | "sync" => StoreKind::Synced,
            _ => StoreKind::Durable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Durable => "durable",
            StoreKind::Session => "session",
            StoreKind::Synced => "synced",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Memory Store ==
/// In-memory store with a byte quota.
///
/// Usage is the sum of key and value lengths in bytes. A write that would take
/// usage past the quota fails with [`StoreError::QuotaExceeded`] and leaves the
/// store unchanged. Keys enumerate in sorted order.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: usize,
    used: usize,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store holding at most `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self::from_entries(BTreeMap::new(), quota)
    }

    /// Creates a store pre-populated with `entries`.
    ///
    /// The quota is not enforced against the initial contents.
    pub fn from_entries(entries: BTreeMap<String, String>, quota: usize) -> Self {
        let used = entries.iter().map(|(k, v)| k.len() + v.len()).sum();
        Self {
            entries,
            quota,
            used,
        }
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl BackingStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let released = self
            .entries
            .get(key)
            .map(|old| key.len() + old.len())
            .unwrap_or(0);
        let needed = key.len() + value.len();
        let available = self.quota.saturating_sub(self.used - released);

        if needed > available {
            return Err(StoreError::QuotaExceeded { needed, available });
        }

        self.entries.insert(key.to_string(), value.to_string());
        self.used = self.used - released + needed;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if let Some(old) = self.entries.remove(key) {
            self.used -= key.len() + old.len();
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.entries.keys().nth(index).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

// == File Store ==
/// Durable store persisted as a single JSON object file.
///
/// Every mutation is written through to disk. A failed write leaves both the
/// file and the in-memory view as they were.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl FileStore {
    // == Constructor ==
    /// Opens (or creates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>, quota: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = fs::read(&path)?;
            serde_json::from_slice::<BTreeMap<String, String>>(&raw)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        Ok(Self {
            inner: MemoryStore::from_entries(entries, quota),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Write to a sibling temp file then rename, so a crash mid-write never
    // truncates the store. This is blocking I/O under the cache lock; bulk
    // removals go through `remove_many` to write the file once.
    fn persist(&self) -> Result<(), StoreError> {
        let data = serde_json::to_vec(self.inner.entries())
            .map_err(|e| StoreError::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn restore(&mut self, key: &str, previous: Option<String>) {
        let result = match previous {
            Some(value) => self.inner.set(key, &value),
            None => self.inner.remove(key),
        };
        if let Err(err) = result {
            debug!(key, error = %err, "Failed to restore record after persist failure");
        }
    }
}

impl BackingStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.inner.get(key);
        self.inner.set(key, value)?;

        if let Err(err) = self.persist() {
            self.restore(key, previous);
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let Some(previous) = self.inner.get(key) else {
            return Ok(());
        };
        self.inner.remove(key)?;

        if let Err(err) = self.persist() {
            self.restore(key, Some(previous));
            return Err(err);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn key_at(&self, index: usize) -> Option<String> {
        self.inner.key_at(index)
    }

    fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    fn remove_many(&mut self, keys: &[String]) -> Result<(), StoreError> {
        let previous: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| self.inner.get(key).map(|value| (key.clone(), value)))
            .collect();
        if previous.is_empty() {
            return Ok(());
        }

        for (key, _) in &previous {
            self.inner.remove(key)?;
        }
        if let Err(err) = self.persist() {
            for (key, value) in previous {
                self.restore(&key, Some(value));
            }
            return Err(err);
        }
        Ok(())
    }
}
