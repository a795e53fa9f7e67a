//! Route handlers for the HTTP surface

use super::AppState;
use crate::conversation::{Role, WireMessage};
use crate::pipeline::SearchResponse;
use crate::sse::{EventStream, StreamEvent, DONE_SENTINEL};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

/// Message returned to clients for any upstream failure
pub const GENERIC_ERROR: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Deserialize)]
pub(crate) struct ChatBody {
    #[serde(default)]
    messages: Option<Vec<WireMessage>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    #[serde(default)]
    query: Option<String>,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// `POST /chat`: streams a completion as server-sent events
///
/// Each delta is sent as `data: {"content": "..."}`; a successful reply
/// ends with `data: [DONE]`, a failed one with `data: {"error": "..."}`.
pub(crate) async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let messages = match payload {
        Ok(Json(ChatBody {
            messages: Some(messages),
        })) => messages,
        Ok(_) => return bad_request("Messages array is required"),
        Err(rejection) => {
            tracing::debug!("Rejected chat request: {}", rejection);
            return bad_request("Messages array is required");
        }
    };

    let mut outbound = Vec::with_capacity(messages.len() + 1);
    outbound.push(WireMessage::new(Role::System, state.system_prompt.as_str()));
    outbound.extend(messages);
    tracing::info!("Chat request with {} messages", outbound.len());

    let provider = state.provider.clone();
    let stream = async_stream::stream! {
        let events = provider.stream_completion(&outbound).await;
        let mut relayed = Box::pin(relay(events));
        while let Some(event) = relayed.next().await {
            yield event;
        }
    };

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn content_event(text: &str) -> Event {
    Event::default().data(json!({ "content": text }).to_string())
}

fn error_event() -> Event {
    Event::default().data(json!({ "error": GENERIC_ERROR }).to_string())
}

/// Converts provider events into the client wire format
fn relay(
    events: crate::error::Result<EventStream>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut completed = false;
        match events {
            Ok(mut events) => {
                while let Some(event) = events.next().await {
                    match event {
                        StreamEvent::Delta(text) => yield Ok(content_event(&text)),
                        StreamEvent::Done => {
                            completed = true;
                            break;
                        }
                        StreamEvent::Error(e) => {
                            tracing::error!("Completion stream failed: {}", e);
                            break;
                        }
                    }
                }
                if !completed {
                    tracing::warn!("Completion stream ended without a completion marker");
                }
            }
            Err(e) => tracing::error!("Completion request failed: {}", e),
        }

        if completed {
            yield Ok(Event::default().data(DONE_SENTINEL));
        } else {
            yield Ok(error_event());
        }
    }
}

/// `POST /search`: web search snippets for a query
pub(crate) async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Response {
    let query = match payload {
        Ok(Json(SearchBody { query: Some(query) })) if !query.trim().is_empty() => query,
        _ => return bad_request("Search query is required"),
    };

    let results = state.search.search(&query).await;
    Json(SearchResponse { results }).into_response()
}

/// `GET /health`: reports whether required provider settings are present
pub(crate) async fn health(State(state): State<AppState>) -> Response {
    let missing = state.config.missing_required();
    let timestamp = Utc::now().to_rfc3339();

    if !missing.is_empty() {
        tracing::warn!(?missing, "Health check failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "message": "Missing required environment variables",
                "missing": missing,
                "timestamp": timestamp,
            })),
        )
            .into_response();
    }

    Json(json!({
        "status": "healthy",
        "message": "Application is running correctly",
        "timestamp": timestamp,
        "environment": state.config.server.environment,
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}
