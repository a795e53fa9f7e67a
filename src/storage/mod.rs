//! Conversation persistence
//!
//! Sessions live in a string key-value store behind the [`KeyValueStore`]
//! trait. The binary uses the sled-backed [`SledStore`]; tests use
//! [`MemoryStore`].

pub mod kv;
pub mod sessions;
pub mod sled_store;
pub mod title;
pub mod types;

pub use kv::{KeyValueStore, MemoryStore, StoreError};
pub use sessions::{SessionPolicy, SessionStore, INDEX_KEY, MESSAGES_PREFIX};
pub use sled_store::SledStore;
pub use title::{derive_title, DEFAULT_TITLE};
pub use types::{SaveOutcome, SessionSummary};
