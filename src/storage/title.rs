//! Session title heuristics

use crate::conversation::context::{contains_any_keyword, strip_context_blocks};
use crate::conversation::{Message, Role};

/// Title used when nothing better can be derived
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum characters of a fallback title before the ellipsis
pub const MAX_TITLE_CHARS: usize = 50;

/// Topic taxonomy, in priority order; the first matching topic names the session
const TOPICS: &[(&str, &[&str])] = &[
    (
        "Contract Review",
        &[
            "contract",
            "agreement",
            "nda",
            "non-disclosure",
            "clause",
            "indemnity",
            "indemnification",
            "breach",
        ],
    ),
    (
        "Litigation",
        &[
            "lawsuit",
            "litigation",
            "complaint",
            "motion",
            "discovery",
            "deposition",
            "trial",
            "subpoena",
        ],
    ),
    (
        "Employment Law",
        &[
            "employment",
            "employee",
            "employer",
            "wrongful termination",
            "discrimination",
            "harassment",
            "severance",
        ],
    ),
    (
        "Real Estate",
        &[
            "lease",
            "landlord",
            "tenant",
            "real estate",
            "mortgage",
            "zoning",
            "easement",
        ],
    ),
    (
        "Intellectual Property",
        &[
            "patent",
            "trademark",
            "copyright",
            "intellectual property",
            "trade secret",
        ],
    ),
    (
        "Corporate",
        &[
            "merger",
            "acquisition",
            "shareholder",
            "corporate",
            "bylaws",
            "board of directors",
        ],
    ),
    (
        "Estate Planning",
        &["estate", "probate", "testament", "inheritance", "trustee"],
    ),
    (
        "Regulatory Compliance",
        &["compliance", "regulatory", "regulation", "gdpr", "hipaa"],
    ),
    (
        "Legal Research",
        &["case law", "precedent", "statute", "jurisdiction"],
    ),
];

/// Derives a session title from its messages
///
/// Scans the lowercased display text of user and assistant messages for the
/// topic taxonomy; the first topic (in priority order) with a match wins.
/// Otherwise the first user message, stripped of attachment lines and
/// bracketed markers, is truncated to [`MAX_TITLE_CHARS`] characters.
///
/// # Examples
///
/// ```
/// use counsel::conversation::Message;
/// use counsel::storage::derive_title;
///
/// let messages = vec![Message::user("Can the landlord keep my deposit?")];
/// assert_eq!(derive_title(&messages), "Real Estate");
///
/// let messages = vec![Message::user("Hello there")];
/// assert_eq!(derive_title(&messages), "Hello there");
/// ```
pub fn derive_title(messages: &[Message]) -> String {
    let corpus = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    if let Some((topic, _)) = TOPICS
        .iter()
        .find(|(_, keywords)| contains_any_keyword(&corpus, keywords))
    {
        return topic.to_string();
    }

    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| fallback_title(&m.content))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn fallback_title(content: &str) -> String {
    let stripped: Vec<&str> = strip_context_blocks(content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("📎") && !(line.starts_with('[') && line.ends_with(']')))
        .collect();
    let collapsed = stripped
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", truncated.trim_end())
    } else {
        collapsed
    }
}
