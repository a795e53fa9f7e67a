use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index entry for a stored conversation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Unique identifier for the session
    pub id: String,
    /// User-friendly title
    pub title: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session was last written
    pub updated_at: DateTime<Utc>,
    /// Number of messages in the session
    pub message_count: usize,
    /// Set once the user renames the session; the title is then kept as is
    #[serde(default)]
    pub title_locked: bool,
}

/// Result of persisting a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written on the first attempt
    Saved,
    /// Written after evicting the listed sessions to free quota
    SavedAfterEviction {
        /// Ids of the evicted sessions, oldest first
        evicted: Vec<String>,
    },
    /// Could not be written; the failure was logged
    Dropped,
}

impl SaveOutcome {
    /// Whether the messages reached the store
    pub fn is_saved(&self) -> bool {
        !matches!(self, SaveOutcome::Dropped)
    }
}
