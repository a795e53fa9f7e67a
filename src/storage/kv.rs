//! Key-value capability backing the session store
//!
//! Values are JSON text. Back-ends enforce an optional byte quota over the
//! sum of key and value lengths and report overruns as
//! [`StoreError::QuotaExceeded`] so callers can evict and retry.

use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors reported by key-value back-ends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The write would push the store past its quota
    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded {
        /// Total bytes the store would hold after the write
        needed: u64,
        /// Configured quota
        quota: u64,
    },

    /// Any other back-end failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Minimal string key-value store
pub trait KeyValueStore: Send + Sync {
    /// Reads a value
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists all keys
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Checks whether replacing `old` with `new` bytes keeps `used` within `quota`
pub(crate) fn check_quota(
    used: u64,
    old: u64,
    new: u64,
    quota: Option<u64>,
) -> Result<u64, StoreError> {
    let needed = used.saturating_sub(old) + new;
    match quota {
        Some(quota) if needed > quota => Err(StoreError::QuotaExceeded { needed, quota }),
        _ => Ok(needed),
    }
}

/// In-process store, used by tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    /// Creates an unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes beyond `quota` bytes
    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: Some(quota),
        }
    }

    /// Bytes currently held
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .read()
            .map(|entries| entries.iter().map(|(k, v)| entry_size(k, v)).sum())
            .unwrap_or(0)
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let used: u64 = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        let old = entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        check_quota(used, old, entry_size(key, value), self.quota)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        // Removing twice is fine
        store.remove("a").unwrap();
    }

    #[test]
    fn test_memory_store_keys_sorted() {
        let store = MemoryStore::new();
        store.set("b", "x").unwrap();
        store.set("a", "y").unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_memory_store_enforces_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap(); // 6 bytes
        let err = store.set("j", "12345").unwrap_err(); // would be 12
        assert_eq!(
            err,
            StoreError::QuotaExceeded {
                needed: 12,
                quota: 10
            }
        );
        assert_eq!(store.get("j").unwrap(), None);
    }

    #[test]
    fn test_memory_store_replacement_counts_old_value() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "123456789").unwrap(); // 10 bytes
        store.set("k", "12").unwrap();
        assert_eq!(store.used_bytes(), 3);
    }

    #[test]
    fn test_quota_error_display() {
        let err = StoreError::QuotaExceeded {
            needed: 12,
            quota: 10,
        };
        assert_eq!(
            err.to_string(),
            "Storage quota exceeded: 12 bytes needed, quota is 10 bytes"
        );
    }
}
