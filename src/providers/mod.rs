//! Completion providers
//!
//! The [`Provider`] trait abstracts the hosted model endpoint; the only
//! implementation talks to an Azure OpenAI deployment.

pub mod azure;
pub mod base;

pub use azure::AzureOpenAiProvider;
pub use base::{
    ContentPart, ImageUrl, Provider, UpstreamContent, UpstreamMessage, DEFAULT_IMAGE_PROMPT,
};

use crate::config::ProviderConfig;
use crate::error::Result;
use std::sync::Arc;

/// Create the configured provider
///
/// # Errors
///
/// Returns error if the HTTP client cannot be initialized
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>> {
    Ok(Arc::new(AzureOpenAiProvider::new(config.clone())?))
}
