//! End-to-end tests for the streaming chat pipeline
//!
//! The chat endpoint is replaced with a scripted transport so each test can
//! control exactly which SSE records arrive and in what order.

mod common;

use common::{
    memory_session_store, pipeline_with, sse_reply, test_settings, text_document, Reply,
    ScriptedTransport,
};
use counsel::conversation::{Role, SearchSnippet, TRUNCATION_MARKER};
use counsel::documents::{DocumentKind, ExtractionStatus, UploadedDocument};
use counsel::pipeline::{ChatPipeline, TurnEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_deltas_arrive_in_order_and_reply_is_persisted() {
    let transport = Arc::new(ScriptedTransport::new(vec![sse_reply(&[
        "The ", "lease ", "is valid.",
    ])]));
    let (mut pipeline, store) = pipeline_with(transport, 12_000);

    let mut turn = pipeline
        .send("Is the lease valid?", Vec::new(), CancellationToken::new())
        .await
        .unwrap();

    let mut deltas = Vec::new();
    let mut terminal = None;
    while let Some(event) = turn.next().await {
        match event {
            TurnEvent::Delta(text) => deltas.push(text),
            other => terminal = Some(other),
        }
    }

    assert_eq!(deltas, vec!["The ", "lease ", "is valid."]);
    assert!(matches!(terminal, Some(TurnEvent::Completed(ref m)) if m.content == "The lease is valid."));

    let stored = store.load_session(pipeline.session_id());
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].role, Role::User);
    assert_eq!(stored[1].content, "The lease is valid.");
    assert_eq!(store.list_sessions()[0].message_count, 2);
}

#[tokio::test]
async fn test_short_history_is_sent_unchanged() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        sse_reply(&["First answer"]),
        sse_reply(&["Second answer"]),
    ]));
    let (mut pipeline, _) = pipeline_with(transport.clone(), 12_000);

    for input in ["What is consideration?", "Give an example"] {
        pipeline
            .send(input, Vec::new(), CancellationToken::new())
            .await
            .unwrap()
            .finish()
            .await;
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let contents: Vec<&str> = sent[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec!["What is consideration?", "First answer", "Give an example"]
    );
}

#[tokio::test]
async fn test_oversized_message_is_truncated_not_dropped() {
    let transport = Arc::new(ScriptedTransport::new(vec![sse_reply(&["Summary"])]));
    let (mut pipeline, _) = pipeline_with(transport.clone(), 12_000);

    // Roughly 20000 estimated tokens
    let huge = "a".repeat(80_000);
    pipeline
        .send(&huge, Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;

    let sent = transport.sent();
    assert_eq!(sent[0].len(), 1);
    let content = &sent[0][0].content;
    assert!(content.ends_with(TRUNCATION_MARKER));
    assert!(content.chars().count() <= 48_000 + TRUNCATION_MARKER.chars().count());
}

#[tokio::test]
async fn test_new_document_is_sent_without_prior_history() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        sse_reply(&["Hello"]),
        sse_reply(&["It is a lease."]),
    ]));
    let (mut pipeline, store) = pipeline_with(transport.clone(), 12_000);

    pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;
    pipeline
        .send(
            "What does this contract say?",
            vec![text_document("lease.txt", "Tenant pays 1,000 per month.")],
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .finish()
        .await;

    let sent = transport.sent();
    assert_eq!(sent[1].len(), 1);
    assert!(sent[1][0].content.contains("UPLOADED FILES FOR ANALYSIS"));
    assert!(sent[1][0].content.contains("--- File: lease.txt ---"));
    assert!(sent[1][0].content.contains("Tenant pays 1,000 per month."));

    // The displayed message lists the file but not its contents
    let stored = store.load_session(pipeline.session_id());
    assert!(stored[2].content.contains("lease.txt"));
    assert!(!stored[2].content.contains("Tenant pays"));
}

#[tokio::test]
async fn test_document_referring_to_earlier_turns_keeps_history() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        sse_reply(&["Noted"]),
        sse_reply(&["They differ on rent."]),
    ]));
    let (mut pipeline, _) = pipeline_with(transport.clone(), 12_000);

    pipeline
        .send(
            "Here is the first lease",
            vec![text_document("lease-a.txt", "Rent is 900.")],
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .finish()
        .await;
    pipeline
        .send(
            "Compare this to the one I sent earlier",
            vec![text_document("lease-b.txt", "Rent is 1,100.")],
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .finish()
        .await;

    let sent = transport.sent();
    assert_eq!(sent[1].len(), 3);
    assert!(sent[1][0].content.contains("Rent is 900."));
    assert!(sent[1][2].content.contains("Rent is 1,100."));
}

#[tokio::test]
async fn test_search_snippets_do_not_pull_history_into_document_analysis() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![sse_reply(&["Hello"]), sse_reply(&["It renews yearly."])])
            .with_search_results(vec![SearchSnippet {
                title: "Previous rulings on renewals".to_string(),
                url: "https://example.com/renewals".to_string(),
                snippet: "Compare with earlier decisions.".to_string(),
            }]),
    );
    let (mut pipeline, _) = pipeline_with(transport.clone(), 12_000);

    pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;
    pipeline
        .send(
            "What does the latest version of this contract say?",
            vec![text_document("contract.txt", "Term renews each year.")],
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .finish()
        .await;

    assert_eq!(transport.searches.lock().unwrap().len(), 1);
    let sent = transport.sent();
    assert_eq!(sent[1].len(), 1);
    assert!(sent[1][0].content.contains("https://example.com/renewals"));
    assert!(sent[1][0].content.contains("Term renews each year."));
}

#[tokio::test]
async fn test_long_pdf_is_condensed_before_sending() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        sse_reply(&["Rent terms"]),
        sse_reply(&["Renewal option"]),
        sse_reply(&["A standard lease."]),
    ]));
    let mut settings = test_settings(12_000);
    settings.pdf_chunk_pages = 2;
    let mut pipeline = ChatPipeline::new(transport.clone(), memory_session_store(), settings);

    let pages: Vec<String> = (1..=3)
        .map(|n| format!("--- Page {} ---\nclause {}", n, n))
        .collect();
    let document = UploadedDocument {
        filename: "lease.pdf".to_string(),
        size_bytes: 2048,
        kind: DocumentKind::Pdf,
        extracted_text: pages.join("\n"),
        status: ExtractionStatus::Ok,
        pages,
    };

    let last = pipeline
        .send("Summarize this lease", vec![document], CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;
    assert!(matches!(last, TurnEvent::Completed(_)));

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0][1].content.contains("pages 1-2"));
    assert!(sent[1][1].content.contains("pages 3-3"));

    let outbound = &sent[2][0].content;
    assert!(outbound.contains("This PDF has 3 pages. It was processed in 2 chunks"));
    assert!(outbound.contains("Pages 1-2 Summary:\nRent terms"));
    assert!(outbound.contains("Pages 3-3 Summary:\nRenewal option"));
    assert!(!outbound.contains("clause 2"));
}

#[tokio::test]
async fn test_cancellation_discards_partial_reply() {
    let transport = Arc::new(ScriptedTransport::new(vec![Reply::Stalls(vec![
        "data: {\"content\":\"The indemnity clause\"}\n\n".to_string(),
    ])]));
    let (mut pipeline, store) = pipeline_with(transport, 12_000);
    let cancel = CancellationToken::new();

    let mut turn = pipeline
        .send("Explain the indemnity clause", Vec::new(), cancel.clone())
        .await
        .unwrap();

    assert_eq!(
        turn.next().await,
        Some(TurnEvent::Delta("The indemnity clause".to_string()))
    );
    assert_eq!(turn.partial(), "The indemnity clause");

    cancel.cancel();
    assert_eq!(turn.next().await, Some(TurnEvent::Cancelled));
    assert_eq!(turn.partial(), "");
    assert_eq!(turn.next().await, None);
    drop(turn);

    let stored = store.load_session(pipeline.session_id());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, Role::User);
}

#[tokio::test]
async fn test_refused_request_fails_without_persisting_reply() {
    let transport = Arc::new(ScriptedTransport::new(vec![Reply::Refused]));
    let (mut pipeline, store) = pipeline_with(transport, 12_000);

    let last = pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;

    assert!(matches!(last, TurnEvent::Failed(_)));
    assert_eq!(pipeline.messages().len(), 1);
    assert_eq!(store.load_session(pipeline.session_id()).len(), 1);
}

#[tokio::test]
async fn test_error_record_mid_stream_fails_turn() {
    let transport = Arc::new(ScriptedTransport::new(vec![Reply::Chunks(vec![
        "data: {\"content\":\"Partial\"}\n\n".to_string(),
        "data: {\"error\":\"upstream timeout\"}\n\n".to_string(),
        "data: {\"content\":\"ignored\"}\n\n".to_string(),
    ])]));
    let (mut pipeline, store) = pipeline_with(transport, 12_000);

    let last = pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;

    assert!(matches!(last, TurnEvent::Failed(_)));
    assert_eq!(store.load_session(pipeline.session_id()).len(), 1);
}

#[tokio::test]
async fn test_stream_without_done_marker_fails_turn() {
    let transport = Arc::new(ScriptedTransport::new(vec![Reply::Chunks(vec![
        "data: {\"content\":\"Cut off\"}\n\n".to_string(),
    ])]));
    let (mut pipeline, _) = pipeline_with(transport, 12_000);

    let last = pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;

    assert!(matches!(last, TurnEvent::Failed(_)));
    assert_eq!(pipeline.messages().len(), 1);
}

#[tokio::test]
async fn test_search_results_reach_the_model_but_not_the_display() {
    let transport = Arc::new(
        ScriptedTransport::new(vec![sse_reply(&["A new rule applies."])]).with_search_results(
            vec![SearchSnippet {
                title: "Court issues ruling".to_string(),
                url: "https://example.com/ruling".to_string(),
                snippet: "The court ruled on Tuesday.".to_string(),
            }],
        ),
    );
    let (mut pipeline, store) = pipeline_with(transport.clone(), 12_000);

    pipeline
        .send(
            "What is the latest news on non-compete rules?",
            Vec::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .finish()
        .await;

    assert_eq!(transport.searches.lock().unwrap().len(), 1);
    let sent = transport.sent();
    assert!(sent[0][0].content.contains("https://example.com/ruling"));

    let stored = store.load_session(pipeline.session_id());
    assert_eq!(
        stored[0].content,
        "What is the latest news on non-compete rules?"
    );
}

#[tokio::test]
async fn test_resume_continues_stored_session() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        sse_reply(&["First"]),
        sse_reply(&["Second"]),
    ]));
    let (mut pipeline, store) = pipeline_with(transport.clone(), 12_000);
    pipeline
        .send("Hello", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;
    let id = pipeline.session_id().to_string();

    let mut resumed = counsel::pipeline::ChatPipeline::resume(
        transport.clone(),
        store.clone(),
        common::test_settings(12_000),
        id.clone(),
    );
    assert_eq!(resumed.messages().len(), 2);
    resumed
        .send("Again", Vec::new(), CancellationToken::new())
        .await
        .unwrap()
        .finish()
        .await;

    assert_eq!(store.load_session(&id).len(), 4);
    assert_eq!(transport.sent()[1].len(), 3);
}
