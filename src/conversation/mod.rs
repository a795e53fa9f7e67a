//! Conversation model and context management
//!
//! Messages, token estimation, history trimming and the keyword predicates
//! that shape what is sent to the completion endpoint.

pub mod context;
pub mod message;
pub mod tokens;
pub mod trimmer;

pub use context::{
    compose_user_message, should_isolate_context, should_search, AttachedText, SearchSnippet,
};
pub use message::{Message, Role, WireMessage};
pub use tokens::{estimate_tokens, CHARS_PER_TOKEN};
pub use trimmer::{trim, TRUNCATION_MARKER};
