//! Streaming chat pipeline
//!
//! One [`ChatPipeline`] drives one conversation: it composes the outbound
//! user message from free text, extracted documents and optional search
//! results, decides whether prior history travels with it, trims to the
//! token budget, streams the reply and persists finalized messages.
//!
//! A reply is consumed through a [`Turn`], which yields [`TurnEvent`]s in
//! arrival order and ends with exactly one terminal event.

pub mod condense;
pub mod transport;

pub use condense::{condense_document, needs_condensing, SUMMARY_UNAVAILABLE};
pub use transport::{ChatRequest, ChatTransport, HttpTransport, SearchRequest, SearchResponse};

use crate::config::Config;
use crate::conversation::{
    compose_user_message, should_isolate_context, should_search, trim, AttachedText, Message,
    WireMessage,
};
use crate::documents::UploadedDocument;
use crate::error::{CounselError, Result};
use crate::prompts::system_prompt_for;
use crate::sse::{decode_chat_events, EventStream, StreamEvent};
use crate::storage::{SaveOutcome, SessionStore};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Knobs that shape outbound requests
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Estimated-token ceiling for history plus system prompt
    pub token_budget: usize,
    /// System prompt the server prepends; reserved from the budget
    pub system_prompt: String,
    /// PDFs with more pages than this are condensed
    pub pdf_chunk_pages: usize,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            token_budget: config.conversation.token_budget,
            system_prompt: system_prompt_for(&config.conversation.firm_name),
            pdf_chunk_pages: config.documents.pdf_chunk_pages,
        }
    }
}

/// Events surfaced while a reply streams
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A text fragment, in arrival order
    Delta(String),
    /// The reply completed and was appended to the session
    Completed(Message),
    /// The reply failed; nothing was persisted
    Failed(String),
    /// The caller aborted; the partial reply was discarded
    Cancelled,
}

impl TurnEvent {
    /// Whether no further events follow
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Delta(_))
    }
}

/// Conversation state plus the collaborators needed to extend it
pub struct ChatPipeline {
    transport: Arc<dyn ChatTransport>,
    store: Arc<SessionStore>,
    settings: PipelineSettings,
    session_id: String,
    messages: Vec<Message>,
}

impl ChatPipeline {
    /// Starts a new, empty conversation
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<SessionStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transport,
            store,
            settings,
            session_id: SessionStore::new_session_id(),
            messages: Vec::new(),
        }
    }

    /// Continues a stored conversation
    ///
    /// An unknown id yields an empty conversation under that id.
    pub fn resume(
        transport: Arc<dyn ChatTransport>,
        store: Arc<SessionStore>,
        settings: PipelineSettings,
        session_id: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        let messages = store.load_session(&session_id);
        tracing::info!(session = %session_id, messages = messages.len(), "Resumed session");
        Self {
            transport,
            store,
            settings,
            session_id,
            messages,
        }
    }

    /// Id of the current session
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Finalized messages of the current session
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Switches to a fresh session; the previous one stays stored
    pub fn start_new_session(&mut self) {
        self.session_id = SessionStore::new_session_id();
        self.messages.clear();
    }

    /// Sends user input with optional extracted documents
    ///
    /// The user message is appended and persisted before the request is
    /// made. Transport failures do not surface here; they arrive as a
    /// [`TurnEvent::Failed`] from the returned turn.
    ///
    /// # Errors
    ///
    /// Returns a validation error when there is neither text nor documents
    pub async fn send(
        &mut self,
        input: &str,
        mut documents: Vec<UploadedDocument>,
        cancel: CancellationToken,
    ) -> Result<Turn<'_>> {
        if input.trim().is_empty() && documents.is_empty() {
            return Err(CounselError::Validation("Message is empty".to_string()).into());
        }

        for document in documents.iter_mut() {
            condense_document(
                self.transport.as_ref(),
                document,
                self.settings.pdf_chunk_pages,
            )
            .await;
        }
        let attached: Vec<AttachedText> = documents
            .into_iter()
            .map(|d| AttachedText {
                filename: d.filename,
                text: d.extracted_text,
            })
            .collect();

        let search_results = if should_search(input) {
            self.transport.search(input).await
        } else {
            Vec::new()
        };

        let message = compose_user_message(input, &attached, &search_results);
        let isolate = should_isolate_context(message.model_text());
        self.messages.push(message);
        self.persist();

        let history: Vec<Message> = if isolate {
            tracing::debug!("Sending uploaded documents without prior history");
            self.messages
                .last()
                .map(Message::to_model_view)
                .into_iter()
                .collect()
        } else {
            self.messages.iter().map(Message::to_model_view).collect()
        };
        let trimmed = trim(
            &history,
            self.settings.token_budget,
            &self.settings.system_prompt,
        );
        let wire: Vec<WireMessage> = trimmed.iter().map(WireMessage::from).collect();

        let events: EventStream = match self.transport.open_chat(wire).await {
            Ok(bytes) => decode_chat_events(bytes),
            Err(e) => Box::pin(futures::stream::iter(vec![StreamEvent::Error(
                e.to_string(),
            )])),
        };

        Ok(Turn {
            pipeline: self,
            events,
            cancel,
            partial: String::new(),
            finished: false,
        })
    }

    fn persist(&self) -> SaveOutcome {
        let outcome = self.store.save_session(&self.session_id, &self.messages);
        match &outcome {
            SaveOutcome::Saved => {}
            SaveOutcome::SavedAfterEviction { evicted } => {
                tracing::info!(session = %self.session_id, evicted = evicted.len(), "Saved after eviction");
            }
            SaveOutcome::Dropped => {
                tracing::warn!(session = %self.session_id, "Session was not saved");
            }
        }
        outcome
    }
}

/// One streaming reply
///
/// Holds the pipeline mutably until the reply ends so only one request per
/// conversation can be in flight.
pub struct Turn<'a> {
    pipeline: &'a mut ChatPipeline,
    events: EventStream,
    cancel: CancellationToken,
    partial: String,
    finished: bool,
}

impl Turn<'_> {
    /// Text received so far
    pub fn partial(&self) -> &str {
        &self.partial
    }

    /// Waits for the next event; `None` after the terminal event
    pub async fn next(&mut self) -> Option<TurnEvent> {
        if self.finished {
            return None;
        }

        let event = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::info!("Reply cancelled after {} chars", self.partial.len());
                return Some(self.finish_with(TurnEvent::Cancelled));
            }
            event = self.events.next() => event,
        };

        match event {
            Some(StreamEvent::Delta(text)) => {
                self.partial.push_str(&text);
                Some(TurnEvent::Delta(text))
            }
            Some(StreamEvent::Done) if self.partial.trim().is_empty() => {
                tracing::warn!("Reply completed without any text");
                Some(self.finish_with(TurnEvent::Failed("Empty reply".to_string())))
            }
            Some(StreamEvent::Done) => {
                let message = Message::assistant(std::mem::take(&mut self.partial));
                self.pipeline.messages.push(message.clone());
                self.pipeline.persist();
                self.finished = true;
                Some(TurnEvent::Completed(message))
            }
            Some(StreamEvent::Error(e)) => {
                tracing::warn!("Reply failed: {}", e);
                Some(self.finish_with(TurnEvent::Failed(e)))
            }
            None => {
                tracing::warn!("Reply stream ended before completion");
                Some(self.finish_with(TurnEvent::Failed(
                    "Stream ended before completion".to_string(),
                )))
            }
        }
    }

    fn finish_with(&mut self, event: TurnEvent) -> TurnEvent {
        self.partial.clear();
        self.finished = true;
        event
    }

    /// Drives the turn to its end, returning the terminal event
    pub async fn finish(mut self) -> TurnEvent {
        loop {
            match self.next().await {
                Some(event) if event.is_terminal() => return event,
                Some(_) => continue,
                None => return TurnEvent::Failed("Turn already finished".to_string()),
            }
        }
    }
}
