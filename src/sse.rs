//! Server-sent event framing
//!
//! [`SseDecoder`] turns arbitrary byte chunks into complete `data:` payloads.
//! [`decode_chat_events`] and [`decode_openai_events`] layer typed
//! [`StreamEvent`]s on top: the first for this application's own `/chat`
//! wire format, the second for the upstream chat-completions format.

use crate::error::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;

/// Sentinel payload that ends a stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Raw response body as a stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Typed events decoded from a byte stream
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// One decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of assistant text
    Delta(String),
    /// The stream failed; no further events follow
    Error(String),
    /// The stream completed normally
    Done,
}

/// Incremental SSE decoder
///
/// Chunks may split a record, a line ending, or a multi-byte UTF-8 character
/// at any point. Complete records (terminated by a blank line) yield their
/// joined `data:` lines; comment and non-data fields are ignored.
///
/// # Examples
///
/// ```
/// use counsel::sse::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"data: {\"content\":").is_empty());
/// assert_eq!(decoder.push(b"\"hi\"}\n\n"), vec![r#"{"content":"hi"}"#]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    pending: Vec<u8>,
}

impl SseDecoder {
    /// Creates an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the payloads of any records it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.take_text(chunk);
        self.buffer.push_str(&text);
        if self.buffer.contains("\r\n") {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..pos + 2).collect();
            if let Some(data) = record_data(&block) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flushes a trailing record that was not terminated by a blank line
    pub fn finish(&mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
            self.pending.clear();
        }
        let block = std::mem::take(&mut self.buffer);
        record_data(&block.replace("\r\n", "\n")).into_iter().collect()
    }

    /// Decodes as much UTF-8 as possible, holding back an incomplete tail
    fn take_text(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }
}

fn record_data(block: &str) -> Option<String> {
    let data_lines: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        return None;
    }
    let data = data_lines.join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}

/// Decodes this application's chat stream
///
/// Records carry `{"content": "..."}` deltas, `{"error": "..."}` failures,
/// or the [`DONE_SENTINEL`]. Malformed records are skipped.
pub fn decode_chat_events(bytes: ByteStream) -> EventStream {
    decode_with(bytes, parse_chat_payload)
}

/// Decodes an upstream chat-completions stream
///
/// Deltas come from `choices[0].delta.content`; empty deltas (role
/// announcements, finish markers) are skipped.
pub fn decode_openai_events(bytes: ByteStream) -> EventStream {
    decode_with(bytes, parse_openai_payload)
}

fn decode_with(mut bytes: ByteStream, parse: fn(&str) -> Option<StreamEvent>) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut decoder = SseDecoder::new();
        let mut ended = false;

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!("Stream interrupted: {}", e);
                    yield StreamEvent::Error(format!("Stream interrupted: {}", e));
                    ended = true;
                    break;
                }
            };

            for payload in decoder.push(&chunk) {
                if let Some(event) = parse(&payload) {
                    let terminal = !matches!(event, StreamEvent::Delta(_));
                    yield event;
                    if terminal {
                        ended = true;
                        break;
                    }
                }
            }
            if ended {
                break;
            }
        }

        if !ended {
            for payload in decoder.finish() {
                if let Some(event) = parse(&payload) {
                    let terminal = !matches!(event, StreamEvent::Delta(_));
                    yield event;
                    if terminal {
                        break;
                    }
                }
            }
        }
    })
}

fn parse_chat_payload(payload: &str) -> Option<StreamEvent> {
    if payload.trim() == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Skipping malformed stream record: {}", e);
            return None;
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(StreamEvent::Error(message));
    }

    match value.get("content").and_then(Value::as_str) {
        Some(content) => Some(StreamEvent::Delta(content.to_string())),
        None => {
            tracing::debug!("Skipping stream record without content");
            None
        }
    }
}

fn parse_openai_payload(payload: &str) -> Option<StreamEvent> {
    if payload.trim() == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Skipping malformed upstream record: {}", e);
            return None;
        }
    };

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Some(StreamEvent::Error(message));
    }

    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(|content| StreamEvent::Delta(content.to_string()))
}
