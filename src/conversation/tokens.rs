//! Approximate token accounting

/// Characters assumed per model token
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates token count for a string using a simple heuristic
///
/// Uses characters / 4 rounded up, which approximates GPT tokenization for
/// English text. The result is only a budgeting aid; the upstream tokenizer
/// may count differently.
///
/// # Examples
///
/// ```
/// use counsel::conversation::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("test"), 1);
/// assert_eq!(estimate_tokens("hello world"), 3);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}
