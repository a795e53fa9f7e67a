//! Base provider trait and upstream message types
//!
//! The completion endpoint is a black box that accepts role/content pairs
//! and streams text back. Providers hide authentication, URL layout and the
//! upstream framing behind [`Provider::stream_completion`].

use crate::conversation::WireMessage;
use crate::documents::image::IMAGE_DATA_LABEL;
use crate::error::Result;
use crate::sse::EventStream;
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Text used when an image message carries no words of its own
pub const DEFAULT_IMAGE_PROMPT: &str =
    "Please analyze this image and extract any text or information.";

/// Message content as sent upstream
///
/// Plain text for ordinary messages; a `[text, image_url]` part list for
/// messages that embed an image data URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamContent {
    /// Plain text content
    Text(String),
    /// Multi-part content for vision requests
    Parts(Vec<ContentPart>),
}

/// One part of a multi-part message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text part
    Text {
        /// The text
        text: String,
    },
    /// Image part referencing a URL (here always a `data:` URL)
    ImageUrl {
        /// Image reference
        image_url: ImageUrl,
    },
}

/// Image reference inside a [`ContentPart::ImageUrl`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    /// URL of the image
    pub url: String,
}

/// A message in upstream form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamMessage {
    /// Role name
    pub role: String,
    /// Content
    pub content: UpstreamContent,
}

fn data_url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"data:image/[^;\s]+;base64,[^\s]+").ok())
        .as_ref()
}

impl From<&WireMessage> for UpstreamMessage {
    /// Converts a wire message, splitting out an embedded image
    ///
    /// The first `data:image/...;base64,` URL becomes an `image_url` part.
    /// The remaining text, minus the embedding label, becomes the text
    /// part, or [`DEFAULT_IMAGE_PROMPT`] when nothing is left.
    fn from(message: &WireMessage) -> Self {
        let role = message.role.as_str().to_string();
        let Some(found) = data_url_pattern().and_then(|re| re.find(&message.content)) else {
            return Self {
                role,
                content: UpstreamContent::Text(message.content.clone()),
            };
        };

        let url = found.as_str().to_string();
        let remaining = format!(
            "{} {}",
            &message.content[..found.start()],
            &message.content[found.end()..]
        );
        let text = remaining
            .lines()
            .filter(|line| line.trim() != IMAGE_DATA_LABEL)
            .collect::<Vec<_>>()
            .join("\n");
        let text = text.trim();
        let text = if text.is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            text.to_string()
        };

        Self {
            role,
            content: UpstreamContent::Parts(vec![
                ContentPart::Text { text },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
        }
    }
}

/// Completion endpoint abstraction
///
/// # Examples
///
/// ```
/// use counsel::conversation::WireMessage;
/// use counsel::error::Result;
/// use counsel::providers::Provider;
/// use counsel::sse::{EventStream, StreamEvent};
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Provider for Echo {
///     async fn stream_completion(&self, messages: &[WireMessage]) -> Result<EventStream> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(Box::pin(futures::stream::iter(vec![
///             StreamEvent::Delta(last),
///             StreamEvent::Done,
///         ])))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Starts a streaming completion
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint
    /// rejects it before streaming starts. Failures after that point arrive
    /// as [`StreamEvent::Error`](crate::sse::StreamEvent::Error).
    async fn stream_completion(&self, messages: &[WireMessage]) -> Result<EventStream>;

    /// Short provider name for logs
    fn name(&self) -> &str {
        "provider"
    }
}
