use crate::config::DocumentsConfig;
use crate::documents::{DocumentExtractor, ExtractionStatus};
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Extract a file the way chat uploads are processed and print the result
///
/// # Errors
///
/// Extraction itself never fails; this only returns `Ok`
pub async fn run_extract(config: DocumentsConfig, file: &Path, mime: Option<&str>) -> Result<()> {
    let extractor = DocumentExtractor::new(config);
    let document = extractor.extract_path(file, mime).await;

    let status = match document.status {
        ExtractionStatus::Ok => document.status.to_string().green(),
        ExtractionStatus::Partial => document.status.to_string().yellow(),
        ExtractionStatus::Failed => document.status.to_string().red(),
    };

    eprintln!("{}    {}", "File:".bold(), document.filename);
    eprintln!("{}    {}", "Kind:".bold(), document.kind.label());
    eprintln!("{}    {} bytes", "Size:".bold(), document.size_bytes);
    eprintln!("{}  {}", "Status:".bold(), status);
    if !document.pages.is_empty() {
        eprintln!("{}   {}", "Pages:".bold(), document.pages.len());
    }
    eprintln!();
    println!("{}", document.extracted_text);

    Ok(())
}
