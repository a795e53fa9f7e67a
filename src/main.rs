//! Counsel - confidential legal chat assistant
//!
#![doc = "Main entry point for the Counsel application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use counsel::cli::{Cli, Commands};
use counsel::commands;
use counsel::config::Config;
use counsel::storage::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::Chat {
            server,
            resume,
            attach,
        } => {
            if let Some(r) = &resume {
                tracing::debug!("Resuming conversation: {}", r);
            }
            commands::run_chat(config, server, resume, attach).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            let store = SessionStore::open_default(&config.storage)?;
            commands::handle_history(&store, command)?;
            Ok(())
        }
        Commands::Extract { file, mime } => {
            commands::run_extract(config.documents, &file, mime.as_deref()).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "counsel=debug" } else { "counsel=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
