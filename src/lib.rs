//! Counsel - confidential legal chat assistant library
//!
//! This library provides the core of the Counsel chat application: the
//! conversation model and context management, document extraction, local
//! session persistence, the streaming chat pipeline, and the HTTP surface
//! that relays completions from a hosted model.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `conversation`: Messages, token estimation, history trimming, context predicates
//! - `documents`: Text extraction from PDF, Word, Excel, image and text uploads
//! - `storage`: Session persistence over a quota-bounded key-value store
//! - `pipeline`: Composing, sending and streaming one conversational turn
//! - `sse`: Server-sent event decoding shared by client and server
//! - `providers`: Completion provider abstraction and the Azure OpenAI client
//! - `search`: Web search for current-event questions
//! - `server`: The `/chat`, `/search` and `/health` endpoints
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use counsel::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!     counsel::server::run(config).await
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod search;
pub mod server;
pub mod sse;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{Message, Role};
pub use documents::{DocumentExtractor, UploadedDocument};
pub use error::{CounselError, Result};
pub use pipeline::{ChatPipeline, TurnEvent};
pub use storage::SessionStore;
