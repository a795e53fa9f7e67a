//! HTTP surface: `/chat`, `/search` and `/health`

mod handlers;

pub use handlers::GENERIC_ERROR;

use crate::config::Config;
use crate::error::{CounselError, Result};
use crate::prompts::system_prompt_for;
use crate::providers::{create_provider, Provider};
use crate::search::SearchClient;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<Config>,
    /// Completion endpoint
    pub provider: Arc<dyn Provider>,
    /// Web search client
    pub search: Arc<SearchClient>,
    /// System prompt prepended to every chat request
    pub system_prompt: Arc<String>,
}

impl AppState {
    /// Builds state from configuration and collaborators
    pub fn new(config: Config, provider: Arc<dyn Provider>, search: SearchClient) -> Self {
        let system_prompt = system_prompt_for(&config.conversation.firm_name);
        Self {
            config: Arc::new(config),
            provider,
            search: Arc::new(search),
            system_prompt: Arc::new(system_prompt),
        }
    }

    /// Builds state with the configured provider and search client
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be initialized
    pub fn from_config(config: Config) -> Result<Self> {
        let provider = create_provider(&config.provider)?;
        let search = SearchClient::new(config.search.clone())?;
        Ok(Self::new(config, provider, search))
    }
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/search", post(handlers::search))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until Ctrl-C
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails
pub async fn run(config: Config) -> Result<()> {
    let missing = config.missing_required();
    if !missing.is_empty() {
        tracing::warn!(
            ?missing,
            "Provider settings incomplete; /chat will fail until they are set"
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CounselError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
