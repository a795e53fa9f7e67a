//! Azure OpenAI compatible chat-completions provider

use super::base::{Provider, UpstreamMessage};
use crate::config::ProviderConfig;
use crate::conversation::WireMessage;
use crate::error::{CounselError, Result};
use crate::sse::{decode_openai_events, ByteStream, EventStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Streaming provider for an Azure OpenAI deployment
///
/// Requests go to
/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
/// with the key in the `api-key` header. Missing settings do not prevent
/// construction; they surface as configuration errors when a completion is
/// requested so the server can still start and report them from `/health`.
pub struct AzureOpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<UpstreamMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

impl AzureOpenAiProvider {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use counsel::config::ProviderConfig;
    /// use counsel::providers::AzureOpenAiProvider;
    ///
    /// let provider = AzureOpenAiProvider::new(ProviderConfig::default());
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("counsel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CounselError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Azure OpenAI provider: endpoint={}, deployment={}",
            config.endpoint.as_deref().unwrap_or("<unset>"),
            config.deployment.as_deref().unwrap_or("<unset>")
        );

        Ok(Self { client, config })
    }

    fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CounselError::Config(format!("{} is not set", name)).into())
    }

    /// Chat-completions URL for the configured deployment
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the endpoint or deployment is unset
    pub fn completions_url(&self) -> Result<String> {
        let endpoint = Self::required(&self.config.endpoint, "AZURE_OPENAI_ENDPOINT")?;
        let deployment = Self::required(&self.config.deployment, "AZURE_OPENAI_DEPLOYMENT_NAME")?;
        Ok(format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            self.config.api_version
        ))
    }
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    async fn stream_completion(&self, messages: &[WireMessage]) -> Result<EventStream> {
        let url = self.completions_url()?;
        let api_key = Self::required(&self.config.api_key, "AZURE_OPENAI_API_KEY")?;
        let deployment = Self::required(&self.config.deployment, "AZURE_OPENAI_DEPLOYMENT_NAME")?;

        let request = ChatCompletionRequest {
            model: deployment,
            messages: messages.iter().map(UpstreamMessage::from).collect(),
            stream: true,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
        };

        tracing::debug!(
            "Sending completion request: {} messages to deployment {}",
            request.messages.len(),
            deployment
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Completion request failed: {}", e);
                CounselError::Provider(format!("Completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Completion endpoint returned error {}: {}", status, error_text);
            return Err(CounselError::Provider(format!(
                "Completion endpoint returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let bytes: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| anyhow::Error::from(CounselError::Http(e)))),
        );
        Ok(decode_openai_events(bytes))
    }

    fn name(&self) -> &str {
        "azure-openai"
    }
}
