//! Outbound context decisions
//!
//! Named keyword predicates that decide whether prior history travels with
//! a document upload and whether a prompt should be augmented with web
//! search, plus composition of the outbound user message.

use crate::conversation::message::Message;

/// Header of the block carrying extracted document text
pub const UPLOADED_FILES_HEADER: &str = "=== UPLOADED FILES FOR ANALYSIS ===";

/// Footer closing the uploaded-files block
pub const UPLOADED_FILES_FOOTER: &str = "=== END OF UPLOADED FILES ===";

/// Header of the block carrying web search snippets
pub const SEARCH_RESULTS_HEADER: &str = "=== WEB SEARCH RESULTS ===";

/// Phrases that indicate the user is referring back to earlier turns
const REFERENCE_KEYWORDS: &[&str] = &[
    "previous",
    "earlier",
    "both",
    "compare",
    "comparison",
    "documents",
    "files",
    "before",
    "last one",
    "prior",
    "above",
    "other one",
    "the first",
    "the second",
    "again",
    "as well",
    "difference",
    "differences",
];

/// Phrases that suggest the answer depends on current information
const SEARCH_KEYWORDS: &[&str] = &[
    "current",
    "recent",
    "latest",
    "today",
    "now",
    "this week",
    "this month",
    "this year",
    "2024",
    "2025",
    "news",
    "update",
    "what is happening",
    "real-time",
    "live",
    "breaking",
    "just announced",
];

/// A document ready to be embedded in an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedText {
    /// Original file name
    pub filename: String,
    /// Extracted (or placeholder) text
    pub text: String,
}

/// A single web search hit used for prompt augmentation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchSnippet {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Short description text
    pub snippet: String,
}

/// Decides whether a message should be sent without prior history
///
/// Returns true when `model_text` carries an uploaded-files block and the
/// user's own words (the part before any search or uploaded-files block) do
/// not refer back to earlier turns.
///
/// # Examples
///
/// ```
/// use counsel::conversation::context::{should_isolate_context, UPLOADED_FILES_HEADER};
///
/// let text = format!("what does this contract say\n\n{}\n...", UPLOADED_FILES_HEADER);
/// assert!(should_isolate_context(&text));
///
/// let text = format!("compare this to the one I sent earlier\n\n{}\n...", UPLOADED_FILES_HEADER);
/// assert!(!should_isolate_context(&text));
/// ```
pub fn should_isolate_context(model_text: &str) -> bool {
    if !model_text.contains(UPLOADED_FILES_HEADER) {
        return false;
    }
    let user_text = strip_context_blocks(model_text).to_lowercase();
    !contains_any_keyword(&user_text, REFERENCE_KEYWORDS)
}

/// Decides whether a prompt should be augmented with web search results
pub fn should_search(text: &str) -> bool {
    contains_any_keyword(&text.to_lowercase(), SEARCH_KEYWORDS)
}

/// Matches keywords on word boundaries so "now" does not fire on "known"
pub(crate) fn contains_any_keyword(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| {
        haystack.match_indices(keyword).any(|(start, _)| {
            let end = start + keyword.len();
            let before_ok = haystack[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            let after_ok = haystack[end..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
            before_ok && after_ok
        })
    })
}

/// Builds the user message for one send
///
/// The display content is the user's text followed by an attachment line
/// listing only file names. The model content additionally carries the
/// search block (if any) and the delimited uploaded-files block. When there
/// is nothing beyond the user's text, no separate model content is stored.
pub fn compose_user_message(
    input: &str,
    documents: &[AttachedText],
    search_results: &[SearchSnippet],
) -> Message {
    let input = input.trim();
    let mut display = input.to_string();
    if !documents.is_empty() {
        let names: Vec<&str> = documents.iter().map(|d| d.filename.as_str()).collect();
        if !display.is_empty() {
            display.push_str("\n\n");
        }
        display.push_str(&format!("📎 Attached: {}", names.join(", ")));
    }

    if documents.is_empty() && search_results.is_empty() {
        return Message::user(display);
    }

    let mut model = input.to_string();
    if !search_results.is_empty() {
        model.push_str("\n\n");
        model.push_str(&format_search_block(search_results));
    }
    if !documents.is_empty() {
        model.push_str("\n\n");
        model.push_str(UPLOADED_FILES_HEADER);
        for document in documents {
            model.push_str(&format!(
                "\n\n--- File: {} ---\n{}",
                document.filename,
                document.text.trim_end()
            ));
        }
        model.push_str("\n\n");
        model.push_str(UPLOADED_FILES_FOOTER);
    }

    Message::user(display).with_model_content(model)
}

fn format_search_block(results: &[SearchSnippet]) -> String {
    let mut block = String::from(SEARCH_RESULTS_HEADER);
    for (idx, result) in results.iter().enumerate() {
        block.push_str(&format!(
            "\n{}. {}\n   {}\n   Source: {}",
            idx + 1,
            result.title,
            result.snippet,
            result.url
        ));
    }
    block.push_str("\n\nUse these results where relevant and cite the sources.");
    block
}

/// Strips an uploaded-files or search block from model text, leaving the
/// user's own words
pub fn strip_context_blocks(text: &str) -> &str {
    let cut = [UPLOADED_FILES_HEADER, SEARCH_RESULTS_HEADER]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..cut].trim_end()
}
