//! Persisted conversation sessions
//!
//! Layout in the underlying [`KeyValueStore`]:
//!
//! * `sessions-index` holds a JSON array of [`SessionSummary`], newest first
//! * `messages-<id>` holds the JSON array of [`Message`] for one session
//!
//! Both values are plain JSON with no version tag; anything that fails to
//! parse is treated as absent.

use super::kv::{KeyValueStore, StoreError};
use super::sled_store::SledStore;
use super::title::derive_title;
use super::types::{SaveOutcome, SessionSummary};
use crate::config::StorageConfig;
use crate::conversation::Message;
use crate::error::{CounselError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Key of the session index
pub const INDEX_KEY: &str = "sessions-index";

/// Prefix of per-session message keys
pub const MESSAGES_PREFIX: &str = "messages-";

/// Limits applied by the session store
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Maximum number of indexed sessions
    pub max_sessions: usize,
    /// Sessions not updated within this window are pruned
    pub retention: Duration,
    /// Sessions evicted at once on quota pressure
    pub eviction_batch: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&StorageConfig::default())
    }
}

impl From<&StorageConfig> for SessionPolicy {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_sessions: config.max_sessions,
            retention: Duration::days(config.retention_days),
            eviction_batch: config.eviction_batch,
        }
    }
}

fn messages_key(id: &str) -> String {
    format!("{}{}", MESSAGES_PREFIX, id)
}

/// Store of named conversations plus their recency index
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    policy: SessionPolicy,
}

impl SessionStore {
    /// Wraps a key-value store without touching its contents
    pub fn new(kv: Arc<dyn KeyValueStore>, policy: SessionPolicy) -> Self {
        Self { kv, policy }
    }

    /// Wraps a key-value store and prunes expired or orphaned sessions
    ///
    /// Pruning failures are logged; the store is usable regardless.
    pub fn open(kv: Arc<dyn KeyValueStore>, policy: SessionPolicy) -> Self {
        let store = Self::new(kv, policy);
        match store.prune_expired() {
            Ok(removed) if !removed.is_empty() => {
                tracing::info!(count = removed.len(), "Pruned stale sessions");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Session pruning failed: {}", e),
        }
        store
    }

    /// Opens the on-disk store described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be resolved or the
    /// database cannot be opened
    pub fn open_default(config: &StorageConfig) -> Result<Self> {
        let path = config.resolve_path()?;
        let kv = SledStore::open(&path, Some(config.quota_bytes))?;
        Ok(Self::open(Arc::new(kv), SessionPolicy::from(config)))
    }

    /// Generates an id for a new chat
    pub fn new_session_id() -> String {
        ulid::Ulid::new().to_string()
    }

    /// Loads the messages of a session
    ///
    /// Missing or unparseable data yields an empty list.
    pub fn load_session(&self, id: &str) -> Vec<Message> {
        let raw = match self.kv.get(&messages_key(id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(session = id, "Failed to read session: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(session = id, "Discarding corrupt session data: {}", e);
            Vec::new()
        })
    }

    /// Sessions ordered by most recent update
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut index = self.load_index();
        sort_by_recency(&mut index);
        index
    }

    /// Index entry for one session
    pub fn get_summary(&self, id: &str) -> Option<SessionSummary> {
        self.load_index().into_iter().find(|s| s.id == id)
    }

    fn load_index(&self) -> Vec<SessionSummary> {
        match self.kv.get(INDEX_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupt session index: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read session index: {}", e);
                Vec::new()
            }
        }
    }

    fn write_index(&self, index: &[SessionSummary]) -> std::result::Result<(), StoreError> {
        let json =
            serde_json::to_string(index).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.kv.set(INDEX_KEY, &json)
    }

    /// Persists a session and refreshes its index entry
    ///
    /// On a quota failure the oldest sessions are evicted and the write is
    /// retried once. A second failure drops the write; it is logged and
    /// reported as [`SaveOutcome::Dropped`] rather than as an error.
    pub fn save_session(&self, id: &str, messages: &[Message]) -> SaveOutcome {
        self.save_session_at(id, messages, Utc::now())
    }

    /// [`save_session`](Self::save_session) with an explicit clock
    pub fn save_session_at(
        &self,
        id: &str,
        messages: &[Message],
        now: DateTime<Utc>,
    ) -> SaveOutcome {
        match self.write_session(id, messages, now) {
            Ok(()) => SaveOutcome::Saved,
            Err(StoreError::QuotaExceeded { needed, quota }) => {
                tracing::warn!(
                    session = id,
                    needed,
                    quota,
                    "Storage quota exceeded, evicting oldest sessions"
                );
                let evicted = self.evict_oldest(id);
                match self.write_session(id, messages, now) {
                    Ok(()) => SaveOutcome::SavedAfterEviction { evicted },
                    Err(e) => {
                        tracing::warn!(session = id, "Dropping session write after retry: {}", e);
                        SaveOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                tracing::warn!(session = id, "Dropping session write: {}", e);
                SaveOutcome::Dropped
            }
        }
    }

    fn write_session(
        &self,
        id: &str,
        messages: &[Message],
        now: DateTime<Utc>,
    ) -> std::result::Result<(), StoreError> {
        let json =
            serde_json::to_string(messages).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.kv.set(&messages_key(id), &json)?;

        let existing = self.get_summary(id);
        let (created_at, title, title_locked) = match existing {
            Some(s) if s.title_locked => (s.created_at, s.title, true),
            Some(s) => (s.created_at, derive_title(messages), false),
            None => (now, derive_title(messages), false),
        };

        self.upsert_index_entry(SessionSummary {
            id: id.to_string(),
            title,
            created_at,
            updated_at: now,
            message_count: messages.len(),
            title_locked,
        })
    }

    /// Inserts or replaces an index entry by id
    ///
    /// The index stays ordered newest first and capped at the configured
    /// maximum; sessions pushed past the cap lose their messages too.
    pub fn upsert_index_entry(
        &self,
        summary: SessionSummary,
    ) -> std::result::Result<(), StoreError> {
        let mut index = self.load_index();
        index.retain(|s| s.id != summary.id);
        index.push(summary);
        sort_by_recency(&mut index);

        let dropped = if index.len() > self.policy.max_sessions {
            index.split_off(self.policy.max_sessions)
        } else {
            Vec::new()
        };

        self.write_index(&index)?;
        for session in dropped {
            tracing::debug!(session = %session.id, "Session fell off the index");
            self.kv.remove(&messages_key(&session.id))?;
        }
        Ok(())
    }

    /// Removes the oldest sessions other than `keep`, returning their ids
    fn evict_oldest(&self, keep: &str) -> Vec<String> {
        let mut index = self.load_index();
        sort_by_recency(&mut index);

        let victims: Vec<String> = index
            .iter()
            .rev()
            .filter(|s| s.id != keep)
            .take(self.policy.eviction_batch)
            .map(|s| s.id.clone())
            .collect();

        for id in &victims {
            if let Err(e) = self.kv.remove(&messages_key(id)) {
                tracing::warn!(session = %id, "Failed to evict session messages: {}", e);
            }
        }
        index.retain(|s| !victims.contains(&s.id));
        if let Err(e) = self.write_index(&index) {
            tracing::warn!("Failed to rewrite index after eviction: {}", e);
        }

        tracing::info!(count = victims.len(), "Evicted sessions to free storage");
        victims
    }

    /// Removes expired sessions and orphaned entries
    ///
    /// Returns the ids of removed sessions. Running it again right away
    /// removes nothing.
    pub fn prune_expired(&self) -> Result<Vec<String>> {
        self.prune_expired_at(Utc::now())
    }

    /// [`prune_expired`](Self::prune_expired) with an explicit clock
    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let cutoff = now - self.policy.retention;
        let index = self.load_index();
        let message_ids: BTreeSet<String> = self
            .kv
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(MESSAGES_PREFIX).map(str::to_string))
            .collect();

        let mut removed = BTreeSet::new();
        let mut kept = Vec::with_capacity(index.len());
        for summary in index {
            if summary.updated_at < cutoff || !message_ids.contains(&summary.id) {
                removed.insert(summary.id);
            } else {
                kept.push(summary);
            }
        }

        let kept_ids: BTreeSet<&str> = kept.iter().map(|s| s.id.as_str()).collect();
        for id in &message_ids {
            if !kept_ids.contains(id.as_str()) {
                self.kv.remove(&messages_key(id))?;
                removed.insert(id.clone());
            }
        }

        if !removed.is_empty() {
            self.write_index(&kept)?;
            tracing::debug!(?removed, "Pruned sessions");
        }
        Ok(removed.into_iter().collect())
    }

    /// Renames a session and locks the title against recomputation
    ///
    /// # Errors
    ///
    /// Returns an error if the title is blank or the session is unknown
    pub fn rename_session(&self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CounselError::Validation("Title cannot be empty".to_string()).into());
        }

        let mut index = self.load_index();
        let entry = index
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CounselError::Storage(format!("Session not found: {}", id)))?;
        entry.title = title.to_string();
        entry.title_locked = true;

        self.write_index(&index)?;
        Ok(())
    }

    /// Deletes a session, returning whether it existed
    pub fn delete_session(&self, id: &str) -> Result<bool> {
        let mut index = self.load_index();
        let before = index.len();
        index.retain(|s| s.id != id);
        let had_messages = self.kv.get(&messages_key(id))?.is_some();

        self.kv.remove(&messages_key(id))?;
        if index.len() != before {
            self.write_index(&index)?;
        }
        Ok(had_messages || index.len() != before)
    }
}

fn sort_by_recency(index: &mut [SessionSummary]) {
    index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
