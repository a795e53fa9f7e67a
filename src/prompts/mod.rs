//! Prompt text sent to the completion endpoint
//!
//! The confidential-assistant system prompt prepended to every chat request
//! and the prompts used when condensing long PDFs chunk by chunk.

use chrono::{Datelike, Utc};

/// System prompt for the chunk summarizer
pub const SUMMARIZER_PROMPT: &str = "You are a legal document summarizer. \
Provide concise but comprehensive summaries of document sections.";

/// Builds the firm's confidential-assistant system prompt
///
/// # Arguments
///
/// * `firm_name` - Firm the assistant serves
/// * `current_year` - Year stated to the model so relative dates resolve
///
/// # Examples
///
/// ```
/// use counsel::prompts::build_system_prompt;
///
/// let prompt = build_system_prompt("Acme LLP", 2026);
/// assert!(prompt.contains("Acme LLP"));
/// assert!(prompt.contains("Current year is 2026."));
/// ```
pub fn build_system_prompt(firm_name: &str, current_year: i32) -> String {
    format!(
        "You are a confidential internal legal research assistant exclusively for {firm} staff.

IMPORTANT CONFIDENTIALITY:
- This is a secure, internal-only tool for {firm} attorneys, paralegals, and staff
- All conversations and uploaded documents are strictly confidential attorney work product
- No data is used for AI training; everything remains private and protected
- Staff can safely upload sensitive client materials, privileged communications, and confidential documents

When asked to create a spreadsheet, format it as proper CSV with comma-separated values, no headers, and no text other than the CSV data itself, so it works correctly when downloaded to CSV.

Provide professional legal analysis, draft documents, and assist attorneys with their work. Current year is {year}.",
        firm = firm_name,
        year = current_year
    )
}

/// System prompt for the configured firm using the current calendar year
pub fn system_prompt_for(firm_name: &str) -> String {
    build_system_prompt(firm_name, Utc::now().year())
}

/// User prompt asking for a summary of one page range
pub fn summarize_pages_prompt(start_page: usize, end_page: usize, text: &str) -> String {
    format!(
        "Summarize the following pages {}-{} of a legal document. Include key points, \
important clauses, parties involved, and critical information:\n\n{}",
        start_page, end_page, text
    )
}
