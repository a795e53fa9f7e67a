//! History trimming against a token budget
//!
//! Selects the newest contiguous suffix of a conversation that fits the
//! budget left after the system prompt. The newest message is always kept:
//! if it alone is too large it is hard-truncated instead of dropped.

use crate::conversation::message::Message;
use crate::conversation::tokens::{estimate_tokens, CHARS_PER_TOKEN};

/// Marker appended to a message that was cut to fit the budget
pub const TRUNCATION_MARKER: &str =
    "\n\n[... Content truncated to fit the context window. Ask about specific sections for more detail ...]";

/// Trims `messages` so the history fits within `token_budget`
///
/// Walks backwards from the second-to-last message and stops at the first
/// message that does not fit; older messages are never reconsidered. When
/// anything was dropped a synthetic system message reporting the count is
/// placed first.
///
/// # Arguments
///
/// * `messages` - Full history, oldest first; the last entry is the newest
/// * `token_budget` - Soft ceiling for the request, in estimated tokens
/// * `system_prompt` - System prompt text whose cost is reserved up front
///
/// # Examples
///
/// ```
/// use counsel::conversation::{trim, Message};
///
/// let history = vec![Message::user("hi"), Message::assistant("hello")];
/// let trimmed = trim(&history, 12_000, "You are a legal assistant.");
/// assert_eq!(trimmed, history);
/// ```
pub fn trim(messages: &[Message], token_budget: usize, system_prompt: &str) -> Vec<Message> {
    let available = token_budget.saturating_sub(estimate_tokens(system_prompt));

    let Some((latest, earlier)) = messages.split_last() else {
        return Vec::new();
    };

    let latest_tokens = estimate_tokens(&latest.content);
    if latest_tokens > available {
        tracing::debug!(
            latest_tokens,
            available,
            "Newest message exceeds budget, truncating"
        );
        return vec![truncate_message(latest, available * CHARS_PER_TOKEN)];
    }

    let mut used = latest_tokens;
    let mut kept_from = earlier.len();
    for (idx, message) in earlier.iter().enumerate().rev() {
        let tokens = estimate_tokens(&message.content);
        if used + tokens > available {
            break;
        }
        used += tokens;
        kept_from = idx;
    }

    let omitted = kept_from;
    let mut result = Vec::with_capacity(earlier.len() - kept_from + 2);
    if omitted > 0 {
        tracing::debug!(omitted, used, available, "Trimmed conversation history");
        result.push(omission_marker(omitted));
    }
    result.extend_from_slice(&earlier[kept_from..]);
    result.push(latest.clone());
    result
}

/// Builds the synthetic marker that replaces omitted history
fn omission_marker(omitted: usize) -> Message {
    let noun = if omitted == 1 { "message" } else { "messages" };
    Message::system(format!(
        "[{} earlier {} omitted to stay within the context window]",
        omitted, noun
    ))
}

/// Truncates a message to `max_chars` characters and appends the marker
fn truncate_message(message: &Message, max_chars: usize) -> Message {
    let mut truncated = message.clone();
    let mut content: String = message.content.chars().take(max_chars).collect();
    content.push_str(TRUNCATION_MARKER);
    truncated.content = content;
    truncated.model_content = None;
    truncated
}
