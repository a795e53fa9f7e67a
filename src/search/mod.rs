//! Web search used to augment prompts with current information
//!
//! Talks to a Brave-compatible search API. Every failure path (missing key,
//! transport error, bad status, unexpected body) yields an empty result
//! list; callers never see an error.

use crate::config::SearchConfig;
use crate::conversation::SearchSnippet;
use crate::error::{CounselError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

/// Client for the web search endpoint
pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

impl SearchClient {
    /// Creates a client
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CounselError::Search(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Whether an API key is configured
    pub fn is_enabled(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }

    /// Searches the web, returning at most `max_results` snippets
    ///
    /// The configured legal-context suffix is appended to the query.
    pub async fn search(&self, query: &str) -> Vec<SearchSnippet> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        if !self.is_enabled() {
            tracing::debug!("Web search skipped: no API key configured");
            return Vec::new();
        }

        match self.fetch(query).await {
            Ok(results) => {
                tracing::debug!(count = results.len(), "Web search returned results");
                results
            }
            Err(e) => {
                tracing::warn!("Web search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<SearchSnippet>> {
        let full_query = format!("{}{}", query, self.config.query_suffix);
        let count = self.config.max_results.to_string();
        let api_key = self.config.api_key.as_deref().unwrap_or_default();

        let response = self
            .client
            .get(&self.config.api_base)
            .query(&[
                ("q", full_query.as_str()),
                ("count", count.as_str()),
            ])
            .header("X-Subscription-Token", api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CounselError::Search(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                CounselError::Search(format!("Search API returned error {}", status)).into(),
            );
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| CounselError::Search(format!("Failed to parse search response: {}", e)))?;

        Ok(body
            .web
            .unwrap_or_default()
            .results
            .into_iter()
            .take(self.config.max_results)
            .map(|r| SearchSnippet {
                title: r.title,
                url: r.url,
                snippet: r.description,
            })
            .collect())
    }
}
