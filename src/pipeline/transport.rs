//! Client side of the HTTP surface
//!
//! [`ChatTransport`] is the seam between the pipeline and the server: the
//! pipeline hands it outbound messages and gets raw SSE bytes back, so tests
//! can replace the network with scripted byte streams.

use crate::conversation::{SearchSnippet, WireMessage};
use crate::error::{CounselError, Result};
use crate::sse::ByteStream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation to complete, oldest first
    pub messages: Vec<WireMessage>,
}

/// Request body of `POST /search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query
    pub query: String,
}

/// Response body of `POST /search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Up to five hits
    #[serde(default)]
    pub results: Vec<SearchSnippet>,
}

/// Access to the chat and search endpoints
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens a streaming chat request and returns the raw SSE body
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails before streaming starts
    async fn open_chat(&self, messages: Vec<WireMessage>) -> Result<ByteStream>;

    /// Runs a web search; failures yield an empty list
    async fn search(&self, query: &str) -> Vec<SearchSnippet>;
}

/// [`ChatTransport`] over HTTP against a running server
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not an absolute http(s) URL or HTTP
    /// client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use counsel::pipeline::HttpTransport;
    ///
    /// let transport = HttpTransport::new("http://127.0.0.1:3000/").unwrap();
    /// assert_eq!(transport.base_url(), "http://127.0.0.1:3000");
    ///
    /// assert!(HttpTransport::new("localhost:3000").is_err());
    /// ```
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| CounselError::Config(format!("Invalid server URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CounselError::Config(format!(
                "Server URL must use http or https: {}",
                base_url
            ))
            .into());
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                CounselError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, base_url })
    }

    /// Server base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_chat(&self, messages: Vec<WireMessage>) -> Result<ByteStream> {
        let url = format!("{}/chat", self.base_url);
        tracing::debug!("Opening chat stream: {} messages", messages.len());

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { messages })
            .send()
            .await
            .map_err(|e| CounselError::Transport(format!("Chat request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CounselError::Transport(format!(
                "Chat endpoint returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        Ok(Box::pin(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| anyhow::Error::from(CounselError::Http(e)))
        })))
    }

    async fn search(&self, query: &str) -> Vec<SearchSnippet> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(15))
            .json(&SearchRequest {
                query: query.to_string(),
            })
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!("Search endpoint returned {}", response.status());
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Search request failed: {}", e);
                return Vec::new();
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(body) => body.results,
            Err(e) => {
                tracing::warn!("Failed to parse search response: {}", e);
                Vec::new()
            }
        }
    }
}
