/*!
Command handlers for the CLI

- `chat`    - Interactive chat against a running server
- `history` - Stored session maintenance
- `extract` - One-off document extraction
- `serve`   - The HTTP API
*/

pub mod chat;
pub mod extract;
pub mod history;
pub mod special_commands;

pub use chat::run_chat;
pub use extract::run_extract;
pub use history::handle_history;

/// HTTP API command handler
pub mod serve {
    use crate::config::Config;
    use crate::error::Result;

    /// Serve `/chat`, `/search` and `/health` until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot bind
    pub async fn run_serve(config: Config) -> Result<()> {
        tracing::info!(
            environment = %config.server.environment,
            "Starting Counsel server v{}",
            env!("CARGO_PKG_VERSION")
        );
        crate::server::run(config).await
    }
}
