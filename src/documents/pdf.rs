//! PDF text extraction
//!
//! Pages are extracted one at a time so a page that cannot be decoded only
//! costs that page. Loading runs on the blocking pool under a timeout.

use super::{Extracted, ExtractionStatus};
use crate::config::DocumentsConfig;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Why a PDF could not be opened at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfLoadFailure {
    /// The bytes do not start like a PDF file
    MalformedHeader,
    /// The document is encrypted
    PasswordProtected,
    /// Parsing did not finish within the configured time
    Timeout,
    /// The parsing worker could not run or crashed
    WorkerInit(String),
    /// The structure is damaged in some other way
    Corrupt(String),
}

impl PdfLoadFailure {
    /// Human-readable diagnostic with remediation guidance
    pub fn diagnostic(&self, filename: &str) -> String {
        match self {
            PdfLoadFailure::MalformedHeader => format!(
                "[PDF {} could not be read: the file does not appear to be a valid PDF (malformed header). \
It may be corrupted or saved in another format. Try re-exporting it as PDF, or paste the relevant text directly.]",
                filename
            ),
            PdfLoadFailure::PasswordProtected => format!(
                "[PDF {} is password-protected. Please remove the password protection and upload it again, \
or paste the relevant text directly.]",
                filename
            ),
            PdfLoadFailure::Timeout => format!(
                "[PDF {} took too long to process and was skipped. Try splitting it into smaller files \
or uploading only the relevant pages.]",
                filename
            ),
            PdfLoadFailure::WorkerInit(reason) => format!(
                "[PDF {} could not be processed because the PDF reader failed to start ({}). \
Please try again, or paste the relevant text directly.]",
                filename, reason
            ),
            PdfLoadFailure::Corrupt(reason) => format!(
                "[PDF {} could not be parsed ({}). The file may be damaged. Try re-saving it from the \
original application, or paste the relevant text directly.]",
                filename, reason
            ),
        }
    }
}

/// Page-level access to a loaded PDF
pub trait PageSource {
    /// Number of pages
    fn page_count(&self) -> u32;

    /// Text of a 1-based page
    fn page_text(&self, page: u32) -> std::result::Result<String, String>;
}

/// [`PageSource`] backed by a parsed lopdf document
pub struct LopdfPages {
    document: lopdf::Document,
    page_numbers: Vec<u32>,
}

impl LopdfPages {
    /// Parses a PDF from memory
    pub fn load(bytes: &[u8]) -> std::result::Result<Self, PdfLoadFailure> {
        if !has_pdf_header(bytes) {
            return Err(PdfLoadFailure::MalformedHeader);
        }

        let document = lopdf::Document::load_mem(bytes).map_err(|e| classify_load_error(&e))?;
        if document.is_encrypted() {
            return Err(PdfLoadFailure::PasswordProtected);
        }

        let page_numbers = document.get_pages().keys().copied().collect();
        Ok(Self {
            document,
            page_numbers,
        })
    }
}

impl PageSource for LopdfPages {
    fn page_count(&self) -> u32 {
        self.page_numbers.len() as u32
    }

    fn page_text(&self, page: u32) -> std::result::Result<String, String> {
        let page_number = *self
            .page_numbers
            .get(page.saturating_sub(1) as usize)
            .ok_or_else(|| format!("page {} not found", page))?;

        // A malformed content stream can make the decoder panic; keep that
        // contained to the page.
        std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.document.extract_text(&[page_number])
        }))
        .map_err(|_| "the page content could not be decoded".to_string())?
        .map_err(|e| e.to_string())
    }
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(5).any(|w| w == b"%PDF-")
}

fn classify_load_error(error: &lopdf::Error) -> PdfLoadFailure {
    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("password") || lower.contains("decrypt") {
        PdfLoadFailure::PasswordProtected
    } else if lower.contains("header") {
        PdfLoadFailure::MalformedHeader
    } else {
        PdfLoadFailure::Corrupt(message)
    }
}

/// Runs blocking parse work on the blocking pool with a deadline
pub(crate) async fn run_blocking<T, F>(
    timeout: Duration,
    work: F,
) -> std::result::Result<T, PdfLoadFailure>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, PdfLoadFailure> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(PdfLoadFailure::Timeout),
        Ok(Err(join_error)) => Err(PdfLoadFailure::WorkerInit(join_error.to_string())),
        Ok(Ok(result)) => result,
    }
}

/// Extracts a PDF into page-marked text
pub(crate) async fn extract_pdf(
    filename: &str,
    bytes: Vec<u8>,
    config: &DocumentsConfig,
) -> Extracted {
    let timeout = Duration::from_secs(config.pdf_timeout_seconds);
    let min_text_chars = config.min_text_chars;

    let result = run_blocking(timeout, move || {
        let source = LopdfPages::load(&bytes)?;
        Ok(assemble_pages(&source, min_text_chars))
    })
    .await;

    match result {
        Ok(extracted) => extracted,
        Err(failure) => {
            tracing::warn!(filename, ?failure, "PDF could not be loaded");
            Extracted::failed(failure.diagnostic(filename))
        }
    }
}

/// Warning appended when a PDF yields almost no text
pub const SCANNED_PDF_WARNING: &str = "[Warning: very little text could be extracted from this PDF. \
It is likely a scanned or image-based document. Run it through OCR or paste the relevant text directly.]";

/// Joins the text of every page, isolating per-page failures
pub fn assemble_pages(source: &dyn PageSource, min_text_chars: usize) -> Extracted {
    let count = source.page_count();
    let mut sections = Vec::with_capacity(count as usize);
    let mut pages = Vec::with_capacity(count as usize);
    let mut failed_pages = 0u32;
    let mut text_chars = 0usize;

    for page in 1..=count {
        let body = match source.page_text(page) {
            Ok(text) => {
                let text = text.trim().to_string();
                text_chars += text.chars().count();
                text
            }
            Err(reason) => {
                failed_pages += 1;
                tracing::debug!(page, reason = %reason, "PDF page extraction failed");
                format!("[Error extracting text from page {}: {}]", page, reason)
            }
        };
        sections.push(format!("--- Page {} ---\n{}", page, body));
        pages.push(body);
    }

    let mut text = format!(
        "Extracted content from PDF ({} pages):\n\n{}",
        count,
        sections.join("\n\n")
    );

    let mut status = if count > 0 && failed_pages == count {
        ExtractionStatus::Failed
    } else if failed_pages > 0 {
        ExtractionStatus::Partial
    } else {
        ExtractionStatus::Ok
    };

    if text_chars < min_text_chars {
        text.push_str("\n\n");
        text.push_str(SCANNED_PDF_WARNING);
        if status == ExtractionStatus::Ok {
            status = ExtractionStatus::Partial;
        }
    }

    Extracted {
        text,
        status,
        pages,
    }
}
