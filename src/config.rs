//! Configuration management for Counsel
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{CounselError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables the completion provider cannot run without
pub const REQUIRED_PROVIDER_VARS: [&str; 3] = [
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_DEPLOYMENT_NAME",
];

/// Main configuration structure for Counsel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion provider (Azure OpenAI compatible) settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Conversation context settings
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Document extraction settings
    #[serde(default)]
    pub documents: DocumentsConfig,
    /// Session store settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Completion provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Resource endpoint, e.g. `https://firm.openai.azure.com`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key sent in the `api-key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Deployment (model) name
    #[serde(default)]
    pub deployment: Option<String>,

    /// API version query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling cutoff
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Request timeout for upstream calls (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_version() -> String {
    "2024-08-01-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_top_p() -> f32 {
    0.95
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_api_version(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search API URL
    #[serde(default = "default_search_api_base")]
    pub api_base: String,

    /// Subscription token; search is disabled when unset
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum results returned to callers
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Text appended to every query to bias results towards legal sources
    #[serde(default = "default_query_suffix")]
    pub query_suffix: String,

    /// Request timeout (seconds)
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: u64,
}

fn default_search_api_base() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_query_suffix() -> String {
    " legal law case".to_string()
}

fn default_search_timeout() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: default_search_api_base(),
            api_key: None,
            max_results: default_max_results(),
            query_suffix: default_query_suffix(),
            timeout_seconds: default_search_timeout(),
        }
    }
}

/// Conversation context configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Estimated-token ceiling for outbound history, system prompt included
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Firm named in the system prompt
    #[serde(default = "default_firm_name")]
    pub firm_name: String,
}

fn default_token_budget() -> usize {
    12_000
}

fn default_firm_name() -> String {
    "Dorf Nelson & Zauderer".to_string()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            firm_name: default_firm_name(),
        }
    }
}

/// Document extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Time allowed for parsing a single PDF (seconds)
    #[serde(default = "default_pdf_timeout")]
    pub pdf_timeout_seconds: u64,

    /// Below this many extracted characters a PDF is flagged as likely scanned
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Largest upload accepted for extraction
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,

    /// PDFs with more pages than this are condensed chunk by chunk
    #[serde(default = "default_pdf_chunk_pages")]
    pub pdf_chunk_pages: usize,

    /// Embed uploaded images as base64 data URLs for vision-capable models
    #[serde(default)]
    pub inline_images: bool,
}

fn default_pdf_timeout() -> u64 {
    60
}

fn default_min_text_chars() -> usize {
    100
}

fn default_max_file_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_pdf_chunk_pages() -> usize {
    50
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            pdf_timeout_seconds: default_pdf_timeout(),
            min_text_chars: default_min_text_chars(),
            max_file_bytes: default_max_file_bytes(),
            pdf_chunk_pages: default_pdf_chunk_pages(),
            inline_images: false,
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the session database; defaults to the user data dir
    #[serde(default)]
    pub path: Option<String>,

    /// Total bytes the store may hold before writes fail with a quota error
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,

    /// Maximum number of indexed sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Sessions not updated within this many days are pruned
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Sessions evicted at once when the quota is hit
    #[serde(default = "default_eviction_batch")]
    pub eviction_batch: usize,
}

fn default_quota_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_max_sessions() -> usize {
    50
}

fn default_retention_days() -> i64 {
    30
}

fn default_eviction_batch() -> usize {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            quota_bytes: default_quota_bytes(),
            max_sessions: default_max_sessions(),
            retention_days: default_retention_days(),
            eviction_batch: default_eviction_batch(),
        }
    }
}

impl StorageConfig {
    /// Resolves the on-disk location of the session database
    ///
    /// Uses the configured path when set, otherwise the platform data
    /// directory (for example `~/.local/share/counsel/sessions`).
    pub fn resolve_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(PathBuf::from(path));
        }

        let proj_dirs = ProjectDirs::from("com", "counsel", "counsel")
            .ok_or_else(|| CounselError::Storage("Could not determine data directory".into()))?;
        Ok(proj_dirs.data_dir().join("sessions"))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Deployment environment label reported by `/health`
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

impl ServerConfig {
    /// Base URL a local client should use to reach this server
    pub fn base_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        format!("http://{}:{}", host, self.port)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CounselError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CounselError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Provider credentials use the names the hosting environment sets
        if let Some(endpoint) = non_empty_env("AZURE_OPENAI_ENDPOINT") {
            self.provider.endpoint = Some(endpoint);
        }

        if let Some(api_key) = non_empty_env("AZURE_OPENAI_API_KEY") {
            self.provider.api_key = Some(api_key);
        }

        if let Some(deployment) = non_empty_env("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.provider.deployment = Some(deployment);
        }

        if let Some(api_version) = non_empty_env("AZURE_OPENAI_API_VERSION") {
            self.provider.api_version = api_version;
        }

        if let Some(search_key) = non_empty_env("BRAVE_SEARCH_API_KEY") {
            self.search.api_key = Some(search_key);
        }

        if let Ok(budget) = std::env::var("COUNSEL_TOKEN_BUDGET") {
            if let Ok(value) = budget.parse() {
                self.conversation.token_budget = value;
            } else {
                tracing::warn!("Invalid COUNSEL_TOKEN_BUDGET: {}", budget);
            }
        }

        if let Some(host) = non_empty_env("COUNSEL_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("COUNSEL_PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid COUNSEL_PORT: {}", port);
            }
        }

        if let Some(environment) = non_empty_env("COUNSEL_ENVIRONMENT") {
            self.server.environment = environment;
        }

        if let Some(path) = non_empty_env("COUNSEL_STORAGE_PATH") {
            tracing::debug!(path = %path, "Env override: COUNSEL_STORAGE_PATH");
            self.storage.path = Some(path);
        }

        if let Ok(quota) = std::env::var("COUNSEL_STORAGE_QUOTA_BYTES") {
            if let Ok(value) = quota.parse() {
                self.storage.quota_bytes = value;
            } else {
                tracing::warn!("Invalid COUNSEL_STORAGE_QUOTA_BYTES: {}", quota);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }

        if let crate::cli::Commands::Serve { host, port } = &cli.command {
            if let Some(host) = host {
                self.server.host = host.clone();
            }
            if let Some(port) = port {
                self.server.port = *port;
            }
        }
    }

    /// Names of required provider settings that are not configured
    ///
    /// Reported by `/health`; an empty list means the server can reach the
    /// completion endpoint.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let values = [
            &self.provider.endpoint,
            &self.provider.api_key,
            &self.provider.deployment,
        ];
        REQUIRED_PROVIDER_VARS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges.
    /// Missing provider credentials are not a validation error; they are
    /// reported through [`Config::missing_required`].
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.conversation.token_budget == 0 {
            return Err(CounselError::Config(
                "conversation.token_budget must be greater than 0".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(CounselError::Config(
                "provider.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.provider.top_p <= 0.0 || self.provider.top_p > 1.0 {
            return Err(CounselError::Config(
                "provider.top_p must be between 0.0 and 1.0".to_string(),
            )
            .into());
        }

        if self.provider.max_tokens == 0 {
            return Err(CounselError::Config(
                "provider.max_tokens must be greater than 0".to_string(),
            )
            .into());
        }

        if self.search.max_results == 0 {
            return Err(CounselError::Config(
                "search.max_results must be greater than 0".to_string(),
            )
            .into());
        }

        if self.documents.pdf_timeout_seconds == 0 {
            return Err(CounselError::Config(
                "documents.pdf_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.documents.pdf_chunk_pages == 0 {
            return Err(CounselError::Config(
                "documents.pdf_chunk_pages must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.max_sessions == 0 {
            return Err(CounselError::Config(
                "storage.max_sessions must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.retention_days <= 0 {
            return Err(CounselError::Config(
                "storage.retention_days must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.quota_bytes == 0 {
            return Err(CounselError::Config(
                "storage.quota_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.port == 0 {
            return Err(
                CounselError::Config("server.port must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 9] = [
        "AZURE_OPENAI_ENDPOINT",
        "AZURE_OPENAI_API_KEY",
        "AZURE_OPENAI_DEPLOYMENT_NAME",
        "AZURE_OPENAI_API_VERSION",
        "BRAVE_SEARCH_API_KEY",
        "COUNSEL_TOKEN_BUDGET",
        "COUNSEL_PORT",
        "COUNSEL_STORAGE_PATH",
        "COUNSEL_STORAGE_QUOTA_BYTES",
    ];

    fn clear_env() {
        for name in ENV_VARS {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversation.token_budget, 12_000);
        assert_eq!(config.provider.temperature, 0.7);
        assert_eq!(config.provider.max_tokens, 4000);
        assert_eq!(config.provider.top_p, 0.95);
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.query_suffix, " legal law case");
        assert_eq!(config.documents.pdf_chunk_pages, 50);
        assert_eq!(config.storage.max_sessions, 50);
        assert_eq!(config.storage.retention_days, 30);
        assert_eq!(config.storage.eviction_batch, 5);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_validation_success() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_budget() {
        let mut config = Config::default();
        config.conversation.token_budget = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_top_p() {
        let mut config = Config::default();
        config.provider.top_p = 1.5;
        assert!(config.validate().is_err());

        config.provider.top_p = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_temperature() {
        let mut config = Config::default();
        config.provider.temperature = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_retention() {
        let mut config = Config::default();
        config.storage.retention_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
provider:
  endpoint: https://firm.openai.azure.com
  deployment: gpt-4o
  temperature: 0.2
conversation:
  token_budget: 8000
storage:
  max_sessions: 10
server:
  port: 8088
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.provider.endpoint.as_deref(),
            Some("https://firm.openai.azure.com")
        );
        assert_eq!(config.provider.temperature, 0.2);
        assert_eq!(config.provider.max_tokens, 4000);
        assert_eq!(config.conversation.token_budget, 8000);
        assert_eq!(config.storage.max_sessions, 10);
        assert_eq!(config.storage.eviction_batch, 5);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let cli = crate::cli::Cli::default();
        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        assert_eq!(config.conversation.token_budget, 12_000);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "conversation:\n  token_budget: 4096\n").unwrap();

        let cli = crate::cli::Cli::default();
        let config = Config::load(path.to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.conversation.token_budget, 4096);
    }

    #[test]
    #[serial]
    fn test_load_invalid_yaml_is_config_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "conversation: [unterminated").unwrap();

        let cli = crate::cli::Cli::default();
        let err = Config::load(path.to_str().unwrap(), &cli).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides() {
        clear_env();
        std::env::set_var("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com");
        std::env::set_var("AZURE_OPENAI_API_KEY", "secret");
        std::env::set_var("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o");
        std::env::set_var("COUNSEL_TOKEN_BUDGET", "6000");
        std::env::set_var("COUNSEL_PORT", "not-a-port");

        let mut config = Config::default();
        config.apply_env_vars();

        assert_eq!(
            config.provider.endpoint.as_deref(),
            Some("https://example.openai.azure.com")
        );
        assert_eq!(config.provider.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.conversation.token_budget, 6000);
        // Invalid values are ignored
        assert_eq!(config.server.port, 3000);
        assert!(config.missing_required().is_empty());

        clear_env();
    }

    #[test]
    fn test_missing_required_lists_unset_values() {
        let mut config = Config::default();
        assert_eq!(config.missing_required(), REQUIRED_PROVIDER_VARS.to_vec());

        config.provider.endpoint = Some("https://x".to_string());
        config.provider.api_key = Some("   ".to_string());
        assert_eq!(
            config.missing_required(),
            vec!["AZURE_OPENAI_API_KEY", "AZURE_OPENAI_DEPLOYMENT_NAME"]
        );
    }

    #[test]
    fn test_cli_overrides_apply_to_serve() {
        let cli = crate::cli::Cli {
            config: None,
            verbose: false,
            json_logs: false,
            storage_path: Some("/tmp/counsel-test".to_string()),
            command: crate::cli::Commands::Serve {
                host: Some("0.0.0.0".to_string()),
                port: Some(9000),
            },
        };
        let mut config = Config::default();
        config.apply_cli_overrides(&cli);

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.path.as_deref(), Some("/tmp/counsel-test"));
        assert_eq!(config.server.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_storage_resolve_path_prefers_configured() {
        let config = StorageConfig {
            path: Some("/var/lib/counsel".to_string()),
            ..StorageConfig::default()
        };
        assert_eq!(
            config.resolve_path().unwrap(),
            PathBuf::from("/var/lib/counsel")
        );
    }
}
