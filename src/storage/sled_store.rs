//! Disk-backed key-value store using an embedded `sled` database

use super::kv::{check_quota, entry_size, KeyValueStore, StoreError};
use crate::error::{CounselError, Result};
use std::path::Path;
use std::sync::Mutex;

/// Persistent [`KeyValueStore`] with a byte quota
///
/// Usage is computed when the database is opened and kept up to date under
/// a mutex so concurrent writers see a consistent total.
pub struct SledStore {
    db: sled::Db,
    quota: Option<u64>,
    used: Mutex<u64>,
}

impl SledStore {
    /// Open or create a store
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database directory
    /// * `quota` - Optional byte quota over keys and values
    ///
    /// # Errors
    ///
    /// Returns `CounselError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use counsel::storage::{KeyValueStore, SledStore};
    ///
    /// # fn main() -> counsel::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let store = SledStore::open(dir.path().join("sessions"), Some(1024))?;
    /// store.set("greeting", "hello")?;
    /// assert_eq!(store.get("greeting")?, Some("hello".to_string()));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>, quota: Option<u64>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CounselError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let db = sled::open(path)
            .map_err(|e| CounselError::Storage(format!("Failed to open database: {}", e)))?;

        let mut used = 0u64;
        for entry in db.iter() {
            let (key, value) =
                entry.map_err(|e| CounselError::Storage(format!("Scan failed: {}", e)))?;
            used += (key.len() + value.len()) as u64;
        }

        tracing::debug!(path = %path.display(), used, ?quota, "Opened session database");

        Ok(Self {
            db,
            quota,
            used: Mutex::new(used),
        })
    }

    fn backend(operation: &str, error: impl std::fmt::Display) -> StoreError {
        StoreError::Backend(format!("{} failed: {}", operation, error))
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        match self.db.get(key).map_err(|e| Self::backend("Get", e))? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|e| Self::backend("Decode", e)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        let mut used = self
            .used
            .lock()
            .map_err(|_| StoreError::Backend("usage lock poisoned".to_string()))?;

        let old = self
            .db
            .get(key)
            .map_err(|e| Self::backend("Get", e))?
            .map(|v| (key.len() + v.len()) as u64)
            .unwrap_or(0);
        let needed = check_quota(*used, old, entry_size(key, value), self.quota)?;

        self.db
            .insert(key, value.as_bytes())
            .map_err(|e| Self::backend("Insert", e))?;
        self.db.flush().map_err(|e| Self::backend("Flush", e))?;
        *used = needed;
        Ok(())
    }

    fn remove(&self, key: &str) -> std::result::Result<(), StoreError> {
        let mut used = self
            .used
            .lock()
            .map_err(|_| StoreError::Backend("usage lock poisoned".to_string()))?;

        if let Some(old) = self.db.remove(key).map_err(|e| Self::backend("Remove", e))? {
            *used = used.saturating_sub((key.len() + old.len()) as u64);
            self.db.flush().map_err(|e| Self::backend("Flush", e))?;
        }
        Ok(())
    }

    fn keys(&self) -> std::result::Result<Vec<String>, StoreError> {
        self.db
            .iter()
            .keys()
            .map(|key| {
                key.map_err(|e| Self::backend("Scan", e))
                    .map(|k| String::from_utf8_lossy(&k).to_string())
            })
            .collect()
    }
}
