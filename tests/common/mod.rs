use async_trait::async_trait;
use bytes::Bytes;
use counsel::conversation::{SearchSnippet, WireMessage};
use counsel::documents::{DocumentKind, ExtractionStatus, UploadedDocument};
use counsel::error::{CounselError, Result};
use counsel::pipeline::{ChatPipeline, ChatTransport, PipelineSettings};
use counsel::sse::ByteStream;
use counsel::storage::{MemoryStore, SessionPolicy, SessionStore};
use futures::StreamExt;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One scripted response of the chat endpoint
#[allow(dead_code)]
pub enum Reply {
    /// SSE chunks, delivered in order
    Chunks(Vec<String>),
    /// SSE chunks followed by a stream that never yields
    Stalls(Vec<String>),
    /// The request fails before streaming starts
    Refused,
}

/// Chat transport that plays back scripted replies and records requests
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    pub sent: Mutex<Vec<Vec<WireMessage>>>,
    pub searches: Mutex<Vec<String>>,
    pub search_results: Vec<SearchSnippet>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn with_search_results(mut self, results: Vec<SearchSnippet>) -> Self {
        self.search_results = results;
        self
    }

    pub fn sent(&self) -> Vec<Vec<WireMessage>> {
        self.sent.lock().unwrap().clone()
    }
}

fn chunk_stream(chunks: Vec<String>) -> impl futures::Stream<Item = Result<Bytes>> {
    futures::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c))))
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_chat(&self, messages: Vec<WireMessage>) -> Result<ByteStream> {
        self.sent.lock().unwrap().push(messages);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Refused);
        match reply {
            Reply::Chunks(chunks) => Ok(Box::pin(chunk_stream(chunks))),
            Reply::Stalls(chunks) => Ok(Box::pin(
                chunk_stream(chunks).chain(futures::stream::pending()),
            )),
            Reply::Refused => {
                Err(CounselError::Transport("connection refused".to_string()).into())
            }
        }
    }

    async fn search(&self, query: &str) -> Vec<SearchSnippet> {
        self.searches.lock().unwrap().push(query.to_string());
        self.search_results.clone()
    }
}

/// SSE chunks for a successful reply made of `deltas`
#[allow(dead_code)]
pub fn sse_reply(deltas: &[&str]) -> Reply {
    let mut chunks: Vec<String> = deltas
        .iter()
        .map(|d| format!("data: {}\n\n", serde_json::json!({ "content": d })))
        .collect();
    chunks.push("data: [DONE]\n\n".to_string());
    Reply::Chunks(chunks)
}

#[allow(dead_code)]
pub fn memory_session_store() -> Arc<SessionStore> {
    Arc::new(SessionStore::new(
        Arc::new(MemoryStore::new()),
        SessionPolicy::default(),
    ))
}

#[allow(dead_code)]
pub fn test_settings(token_budget: usize) -> PipelineSettings {
    PipelineSettings {
        token_budget,
        system_prompt: "You are a legal assistant.".to_string(),
        pdf_chunk_pages: 50,
    }
}

#[allow(dead_code)]
pub fn pipeline_with(
    transport: Arc<ScriptedTransport>,
    token_budget: usize,
) -> (ChatPipeline, Arc<SessionStore>) {
    let store = memory_session_store();
    let pipeline = ChatPipeline::new(transport, store.clone(), test_settings(token_budget));
    (pipeline, store)
}

#[allow(dead_code)]
pub fn text_document(filename: &str, text: &str) -> UploadedDocument {
    UploadedDocument {
        filename: filename.to_string(),
        size_bytes: text.len(),
        kind: DocumentKind::PlainText,
        extracted_text: text.to_string(),
        status: ExtractionStatus::Ok,
        pages: Vec::new(),
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
