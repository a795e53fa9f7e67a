//! Error types for Counsel
//!
//! This module defines the error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Counsel operations
///
/// Most of the chat pipeline degrades silently (see the `documents` and
/// `pipeline` modules); these variants cover the paths that do propagate:
/// configuration, outbound HTTP, request validation and storage plumbing.
#[derive(Error, Debug)]
pub enum CounselError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Completion provider errors (upstream API calls, authentication, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Chat transport errors between the pipeline and the chat endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Web search provider errors
    #[error("Search error: {0}")]
    Search(String),

    /// Document extraction errors (only used internally before being
    /// converted into a descriptive placeholder)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Session storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed or missing request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Counsel operations
///
/// Uses `anyhow::Error` as the error type, allowing for rich error context
/// and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
