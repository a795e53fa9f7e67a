//! Upstream HTTP clients against a `wiremock` mock server
//!
//! Use `set_body_raw(bytes, "text/event-stream")` for streamed completions so
//! the body arrives exactly as an SSE endpoint would send it.

use counsel::config::{ProviderConfig, SearchConfig};
use counsel::conversation::{Role, WireMessage};
use counsel::providers::{AzureOpenAiProvider, Provider};
use counsel::search::SearchClient;
use counsel::sse::StreamEvent;
use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYMENT_PATH: &str = "/openai/deployments/gpt-4o/chat/completions";

fn provider_for(server: &MockServer) -> AzureOpenAiProvider {
    AzureOpenAiProvider::new(ProviderConfig {
        endpoint: Some(server.uri()),
        api_key: Some("test-key".to_string()),
        deployment: Some("gpt-4o".to_string()),
        timeout_seconds: 5,
        ..ProviderConfig::default()
    })
    .expect("provider")
}

fn question() -> Vec<WireMessage> {
    vec![
        WireMessage::new(Role::System, "You are a legal assistant."),
        WireMessage::new(Role::User, "What is a lien?"),
    ]
}

#[tokio::test]
async fn test_provider_streams_openai_deltas() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"A lien is \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"a security interest.\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(query_param("api-version", "2024-08-01-preview"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({ "stream": true, "model": "gpt-4o" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let events: Vec<StreamEvent> = provider
        .stream_completion(&question())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Delta("A lien is ".to_string()),
            StreamEvent::Delta("a security interest.".to_string()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn test_provider_error_status_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let err = match provider_for(&server).stream_completion(&question()).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    let message = err.to_string();
    assert!(message.contains("401"));
    assert!(message.contains("invalid key"));
}

#[tokio::test]
async fn test_provider_inline_error_ends_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Part\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"content filtered\"}}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let events: Vec<StreamEvent> = provider_for(&server)
        .stream_completion(&question())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], StreamEvent::Delta("Part".to_string()));
    assert!(matches!(&events[1], StreamEvent::Error(e) if e.contains("content filtered")));
}

fn search_client_for(server: &MockServer, api_key: Option<&str>) -> SearchClient {
    SearchClient::new(SearchConfig {
        api_base: format!("{}/res/v1/web/search", server.uri()),
        api_key: api_key.map(str::to_string),
        timeout_seconds: 5,
        ..SearchConfig::default()
    })
    .expect("search client")
}

#[tokio::test]
async fn test_search_maps_results_and_caps_count() {
    let server = MockServer::start().await;
    let results: Vec<_> = (1..=7)
        .map(|i| {
            json!({
                "title": format!("Result {}", i),
                "url": format!("https://example.com/{}", i),
                "description": format!("Snippet {}", i),
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/res/v1/web/search"))
        .and(query_param("q", "recent eviction rulings legal law case"))
        .and(query_param("count", "5"))
        .and(header("X-Subscription-Token", "brave-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "web": { "results": results } })))
        .expect(1)
        .mount(&server)
        .await;

    let snippets = search_client_for(&server, Some("brave-key"))
        .search("recent eviction rulings")
        .await;

    assert_eq!(snippets.len(), 5);
    assert_eq!(snippets[0].title, "Result 1");
    assert_eq!(snippets[0].url, "https://example.com/1");
    assert_eq!(snippets[0].snippet, "Snippet 1");
}

#[tokio::test]
async fn test_search_failure_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let snippets = search_client_for(&server, Some("brave-key"))
        .search("latest news")
        .await;
    assert!(snippets.is_empty());
}

#[tokio::test]
async fn test_search_without_web_section_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "type": "search" })))
        .mount(&server)
        .await;

    let snippets = search_client_for(&server, Some("brave-key"))
        .search("latest news")
        .await;
    assert!(snippets.is_empty());
}

#[tokio::test]
async fn test_search_without_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let snippets = search_client_for(&server, None).search("latest news").await;
    assert!(snippets.is_empty());
}

#[tokio::test]
async fn test_http_transport_posts_messages_and_returns_sse_body() {
    use counsel::pipeline::{ChatTransport, HttpTransport};
    use counsel::sse::decode_chat_events;

    let server = MockServer::start().await;
    let body = "data: {\"content\":\"Hello\"}\n\ndata: [DONE]\n\n";
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "Hi" }]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpTransport::new(format!("{}/", server.uri())).unwrap();
    let bytes = transport
        .open_chat(vec![WireMessage::new(Role::User, "Hi")])
        .await
        .unwrap();
    let events: Vec<StreamEvent> = decode_chat_events(bytes).collect().await;

    assert_eq!(
        events,
        vec![StreamEvent::Delta("Hello".to_string()), StreamEvent::Done]
    );
}

#[tokio::test]
async fn test_http_transport_rejected_chat_is_error() {
    use counsel::pipeline::{ChatTransport, HttpTransport};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Messages array is required" })),
        )
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).unwrap();
    assert!(transport.open_chat(Vec::new()).await.is_err());
}

#[tokio::test]
async fn test_http_transport_search_round_trip() {
    use counsel::pipeline::{ChatTransport, HttpTransport};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({ "query": "latest rulings" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "title": "Ruling", "url": "https://example.com", "snippet": "Decided." }]
        })))
        .mount(&server)
        .await;

    let transport = HttpTransport::new(server.uri()).unwrap();
    let results = transport.search("latest rulings").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].snippet, "Decided.");

    let unreachable = HttpTransport::new("http://127.0.0.1:9").unwrap();
    assert!(unreachable.search("latest rulings").await.is_empty());
}
