//! Chat message types shared by the pipeline, the session store and the
//! HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user of the assistant
    User,
    /// Model response
    Assistant,
    /// Instructions or synthetic markers that are not shown as chat bubbles
    System,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finalized conversation message
///
/// `content` is what the user sees. When the text sent to the model differs
/// (for example a user message carrying extracted document text) the model
/// representation is kept in `model_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier (ULID)
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Display content
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Model-input content when it differs from the display content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_content: Option<String>,
}

impl Message {
    /// Creates a message with a fresh id and the current timestamp
    ///
    /// # Examples
    ///
    /// ```
    /// use counsel::conversation::{Message, Role};
    ///
    /// let msg = Message::new(Role::User, "Review this NDA");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.model_text(), "Review this NDA");
    /// ```
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            model_content: None,
        }
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attaches a model-input representation that differs from the display text
    pub fn with_model_content(mut self, model_content: impl Into<String>) -> Self {
        self.model_content = Some(model_content.into());
        self
    }

    /// Text that should be sent to the model for this message
    pub fn model_text(&self) -> &str {
        self.model_content.as_deref().unwrap_or(&self.content)
    }

    /// Returns a copy whose `content` is the model representation
    ///
    /// The trimmer budgets on `content`, so outbound history is normalized
    /// with this before trimming.
    pub fn to_model_view(&self) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            content: self.model_text().to_string(),
            timestamp: self.timestamp,
            model_content: None,
        }
    }
}

/// Role/content pair as exchanged with the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Role name
    pub role: Role,
    /// Plain text content
    pub content: String,
}

impl WireMessage {
    /// Creates a wire message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.model_text().to_string(),
        }
    }
}
