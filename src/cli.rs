//! Command-line interface definition for Counsel
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for serving the chat API, chatting interactively,
//! maintaining stored sessions and inspecting document extraction.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Counsel - confidential legal chat assistant
///
/// Streams answers from a hosted completion endpoint, analyzes uploaded
/// documents and keeps conversation history on the local machine.
#[derive(Parser, Debug, Clone)]
#[command(name = "counsel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the session store location
    #[arg(long)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Counsel
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP API (/chat, /search, /health)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start an interactive chat against a running server
    Chat {
        /// Base URL of the Counsel server
        #[arg(short, long)]
        server: Option<String>,

        /// Resume a stored session by id
        #[arg(short, long)]
        resume: Option<String>,

        /// Files to attach to the first message
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },

    /// Manage stored conversation sessions
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Extract text from a document the same way uploads are processed
    Extract {
        /// File to extract
        file: PathBuf,

        /// Declared MIME type (defaults to detection by extension)
        #[arg(short, long)]
        mime: Option<String>,
    },
}

/// Session history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored sessions, most recent first
    List,

    /// Print the messages of a session
    Show {
        /// Session id
        id: String,
    },

    /// Rename a session and lock its title
    Rename {
        /// Session id
        id: String,

        /// New title
        title: String,
    },

    /// Delete a session and its messages
    Delete {
        /// Session id
        id: String,
    },

    /// Remove sessions older than the retention window
    Prune,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            storage_path: None,
            command: Commands::History {
                command: HistoryCommand::List,
            },
        }
    }
}
