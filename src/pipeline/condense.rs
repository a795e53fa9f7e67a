//! Long-PDF condensation
//!
//! PDFs longer than the chunk size would swamp the context window, so their
//! pages are summarized range by range through the chat endpoint and the
//! document text is replaced by the concatenated summaries.

use super::transport::ChatTransport;
use crate::conversation::{Role, WireMessage};
use crate::documents::{DocumentKind, UploadedDocument};
use crate::prompts::{summarize_pages_prompt, SUMMARIZER_PROMPT};
use crate::sse::{decode_chat_events, StreamEvent};
use futures::StreamExt;

/// Placeholder used for a page range whose summary failed
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable";

/// Whether a document is long enough to be condensed
pub fn needs_condensing(document: &UploadedDocument, chunk_pages: usize) -> bool {
    chunk_pages > 0 && document.kind == DocumentKind::Pdf && document.pages.len() > chunk_pages
}

/// Replaces a long PDF's text with per-range summaries
///
/// Each range of `chunk_pages` pages is summarized separately. A failed
/// range contributes [`SUMMARY_UNAVAILABLE`]; the rest are kept.
pub async fn condense_document(
    transport: &dyn ChatTransport,
    document: &mut UploadedDocument,
    chunk_pages: usize,
) {
    if !needs_condensing(document, chunk_pages) {
        return;
    }

    let total = document.pages.len();
    let chunk_count = (total + chunk_pages - 1) / chunk_pages;
    tracing::info!(
        file = %document.filename,
        pages = total,
        chunks = chunk_count,
        "Condensing long PDF"
    );

    let mut summaries = Vec::with_capacity(chunk_count);
    for (idx, chunk) in document.pages.chunks(chunk_pages).enumerate() {
        let start = idx * chunk_pages + 1;
        let end = start + chunk.len() - 1;
        let summary = summarize_range(transport, start, end, &chunk.join("\n")).await;
        summaries.push(format!("Pages {}-{} Summary:\n{}", start, end, summary));
    }

    document.extracted_text = format!(
        "This PDF has {} pages. It was processed in {} chunks and summarized below:\n\n{}",
        total,
        chunk_count,
        summaries.join("\n\n---\n\n")
    );
}

async fn summarize_range(
    transport: &dyn ChatTransport,
    start: usize,
    end: usize,
    text: &str,
) -> String {
    let messages = vec![
        WireMessage::new(Role::System, SUMMARIZER_PROMPT),
        WireMessage::new(Role::User, summarize_pages_prompt(start, end, text)),
    ];

    let bytes = match transport.open_chat(messages).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(start, end, "Chunk summary request failed: {}", e);
            return SUMMARY_UNAVAILABLE.to_string();
        }
    };

    let mut events = decode_chat_events(bytes);
    let mut summary = String::new();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Delta(text) => summary.push_str(&text),
            StreamEvent::Done => break,
            StreamEvent::Error(e) => {
                tracing::warn!(start, end, "Chunk summary failed: {}", e);
                return SUMMARY_UNAVAILABLE.to_string();
            }
        }
    }

    if summary.trim().is_empty() {
        SUMMARY_UNAVAILABLE.to_string()
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::ExtractionStatus;
    use crate::error::{CounselError, Result};
    use crate::sse::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies to summary requests in order; `None` refuses the request
    #[derive(Default)]
    struct Summarizer {
        replies: Mutex<VecDeque<Option<Vec<&'static str>>>>,
        sent: Mutex<Vec<Vec<WireMessage>>>,
    }

    impl Summarizer {
        fn new(replies: Vec<Option<Vec<&'static str>>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ChatTransport for Summarizer {
        async fn open_chat(&self, messages: Vec<WireMessage>) -> Result<ByteStream> {
            self.sent.lock().unwrap().push(messages);
            match self.replies.lock().unwrap().pop_front().flatten() {
                Some(chunks) => Ok(Box::pin(futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<_, anyhow::Error>(Bytes::from_static(c.as_bytes()))),
                ))),
                None => Err(CounselError::Transport("connection refused".to_string()).into()),
            }
        }

        async fn search(&self, _query: &str) -> Vec<crate::conversation::SearchSnippet> {
            Vec::new()
        }
    }

    fn pdf(page_count: usize) -> UploadedDocument {
        let pages: Vec<String> = (1..=page_count)
            .map(|n| format!("--- Page {} ---\nclause {}", n, n))
            .collect();
        UploadedDocument {
            filename: "lease.pdf".to_string(),
            size_bytes: 1024,
            kind: DocumentKind::Pdf,
            extracted_text: pages.join("\n"),
            status: ExtractionStatus::Ok,
            pages,
        }
    }

    #[test]
    fn test_needs_condensing_threshold() {
        assert!(!needs_condensing(&pdf(2), 2));
        assert!(needs_condensing(&pdf(3), 2));
        assert!(!needs_condensing(&pdf(3), 0));

        let mut text = pdf(3);
        text.kind = DocumentKind::PlainText;
        assert!(!needs_condensing(&text, 2));
    }

    #[tokio::test]
    async fn test_short_pdf_is_left_alone() {
        let transport = Summarizer::default();
        let mut document = pdf(2);
        let original = document.extracted_text.clone();

        condense_document(&transport, &mut document, 2).await;

        assert_eq!(document.extracted_text, original);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranges_are_summarized_and_failures_marked() {
        let transport = Summarizer::new(vec![
            Some(vec!["data: {\"content\":\"Parties named\"}\n\n", "data: [DONE]\n\n"]),
            None,
            Some(vec!["data: {\"content\":\"Termination\"}\n\ndata: [DONE]\n\n"]),
        ]);
        let mut document = pdf(5);

        condense_document(&transport, &mut document, 2).await;

        let text = &document.extracted_text;
        assert!(text.starts_with("This PDF has 5 pages. It was processed in 3 chunks"));
        assert!(text.contains("Pages 1-2 Summary:\nParties named"));
        assert!(text.contains(&format!("Pages 3-4 Summary:\n{}", SUMMARY_UNAVAILABLE)));
        assert!(text.contains("Pages 5-5 Summary:\nTermination"));
        assert!(!text.contains("clause 1"));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0][0].role, Role::System);
        assert!(sent[1][1].content.contains("pages 3-4"));
        assert!(sent[1][1].content.contains("clause 3\n--- Page 4 ---\nclause 4"));
    }

    #[tokio::test]
    async fn test_error_or_empty_summary_is_unavailable() {
        let transport = Summarizer::new(vec![
            Some(vec![
                "data: {\"content\":\"half\"}\n\n",
                "data: {\"error\":\"rate limited\"}\n\n",
            ]),
            Some(vec!["data: [DONE]\n\n"]),
        ]);
        let mut document = pdf(4);

        condense_document(&transport, &mut document, 2).await;

        assert!(document
            .extracted_text
            .contains(&format!("Pages 1-2 Summary:\n{}", SUMMARY_UNAVAILABLE)));
        assert!(document
            .extracted_text
            .contains(&format!("Pages 3-4 Summary:\n{}", SUMMARY_UNAVAILABLE)));
        assert!(!document.extracted_text.contains("half"));
    }
}
