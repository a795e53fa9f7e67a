//! Document extraction for uploaded files
//!
//! Every upload is classified once into a [`DocumentKind`] and then handled
//! by the matching extractor. Extraction never fails: unreadable input turns
//! into a descriptive placeholder so the conversation can continue with
//! degraded content.

pub mod excel;
pub mod image;
pub mod pdf;
pub mod word;

use crate::config::DocumentsConfig;
use std::path::Path;

/// Format of an uploaded document, resolved from MIME type and extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// UTF-8 text (txt, md, csv, json, ...)
    PlainText,
    /// Portable Document Format
    Pdf,
    /// Office Open XML word processing document
    Docx,
    /// Legacy binary Word document
    Doc,
    /// Office Open XML spreadsheet
    Xlsx,
    /// Legacy binary Excel workbook
    Xls,
    /// Raster image
    Image,
    /// Anything else
    Unsupported,
}

const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "xml", "html", "htm", "log", "yaml", "yml",
    "rtf", "eml",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff"];

impl DocumentKind {
    /// Classifies a file by declared MIME type, falling back to the extension
    ///
    /// # Examples
    ///
    /// ```
    /// use counsel::documents::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::detect("brief.PDF", None), DocumentKind::Pdf);
    /// assert_eq!(
    ///     DocumentKind::detect("upload", Some("application/vnd.ms-excel")),
    ///     DocumentKind::Xls
    /// );
    /// ```
    pub fn detect(filename: &str, mime: Option<&str>) -> Self {
        if let Some(kind) = mime.and_then(Self::from_mime) {
            return kind;
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => DocumentKind::Pdf,
            "docx" => DocumentKind::Docx,
            "doc" => DocumentKind::Doc,
            "xlsx" | "xlsm" => DocumentKind::Xlsx,
            "xls" => DocumentKind::Xls,
            ext if IMAGE_EXTENSIONS.contains(&ext) => DocumentKind::Image,
            ext if PLAIN_TEXT_EXTENSIONS.contains(&ext) => DocumentKind::PlainText,
            _ => DocumentKind::Unsupported,
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let kind = match mime.as_str() {
            "application/pdf" => DocumentKind::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                DocumentKind::Docx
            }
            "application/msword" => DocumentKind::Doc,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                DocumentKind::Xlsx
            }
            "application/vnd.ms-excel" => DocumentKind::Xls,
            "application/json" | "application/xml" => DocumentKind::PlainText,
            m if m.starts_with("image/") => DocumentKind::Image,
            m if m.starts_with("text/") => DocumentKind::PlainText,
            _ => return None,
        };
        Some(kind)
    }

    /// Short human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::PlainText => "text",
            DocumentKind::Pdf => "PDF",
            DocumentKind::Docx => "Word",
            DocumentKind::Doc => "Word (legacy)",
            DocumentKind::Xlsx => "Excel",
            DocumentKind::Xls => "Excel (legacy)",
            DocumentKind::Image => "image",
            DocumentKind::Unsupported => "unsupported",
        }
    }
}

/// Outcome of extracting one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// All content was extracted
    Ok,
    /// Some content was extracted, or only guidance text could be produced
    Partial,
    /// Nothing usable was extracted; the text is a placeholder
    Failed,
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExtractionStatus::Ok => "ok",
            ExtractionStatus::Partial => "partial",
            ExtractionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// An uploaded file after extraction
///
/// Lives only while one outbound message is being composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedDocument {
    /// Original file name
    pub filename: String,
    /// Size of the uploaded bytes
    pub size_bytes: usize,
    /// Detected format
    pub kind: DocumentKind,
    /// Normalized text, or a descriptive placeholder on failure
    pub extracted_text: String,
    /// Extraction outcome
    pub status: ExtractionStatus,
    /// Per-page text for PDFs (empty for other formats)
    pub pages: Vec<String>,
}

/// Intermediate result produced by the format extractors
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Extracted {
    pub text: String,
    pub status: ExtractionStatus,
    pub pages: Vec<String>,
}

impl Extracted {
    pub(crate) fn new(text: impl Into<String>, status: ExtractionStatus) -> Self {
        Self {
            text: text.into(),
            status,
            pages: Vec::new(),
        }
    }

    pub(crate) fn failed(text: impl Into<String>) -> Self {
        Self::new(text, ExtractionStatus::Failed)
    }
}

/// Converts uploaded files into prompt text
#[derive(Debug, Clone, Default)]
pub struct DocumentExtractor {
    config: DocumentsConfig,
}

impl DocumentExtractor {
    /// Creates an extractor with the given limits
    pub fn new(config: DocumentsConfig) -> Self {
        Self { config }
    }

    /// Extracts text from an uploaded file
    ///
    /// Never returns an error. Unreadable, oversized or unsupported input
    /// produces a placeholder with [`ExtractionStatus::Failed`].
    pub async fn extract(
        &self,
        filename: &str,
        mime: Option<&str>,
        bytes: Vec<u8>,
    ) -> UploadedDocument {
        let kind = DocumentKind::detect(filename, mime);
        let size_bytes = bytes.len();

        tracing::debug!(
            filename,
            size_bytes,
            kind = kind.label(),
            "Extracting uploaded document"
        );

        let extracted = if size_bytes > self.config.max_file_bytes {
            Extracted::failed(format!(
                "[File {} is too large to analyze ({} bytes, limit {} bytes). Please upload a smaller excerpt.]",
                filename, size_bytes, self.config.max_file_bytes
            ))
        } else {
            match kind {
                DocumentKind::PlainText => extract_plain_text(filename, &bytes),
                DocumentKind::Pdf => pdf::extract_pdf(filename, bytes, &self.config).await,
                DocumentKind::Docx => word::extract_docx(filename, &bytes),
                DocumentKind::Doc => word::extract_doc(filename, &bytes),
                DocumentKind::Xlsx => excel::extract_xlsx(filename, &bytes),
                DocumentKind::Xls => excel::extract_xls(filename, &bytes),
                DocumentKind::Image => {
                    image::describe_image(filename, mime, &bytes, self.config.inline_images)
                }
                DocumentKind::Unsupported => extract_unsupported(filename, &bytes),
            }
        };

        if extracted.status != ExtractionStatus::Ok {
            tracing::warn!(
                filename,
                status = %extracted.status,
                "Document extraction degraded"
            );
        }

        UploadedDocument {
            filename: filename.to_string(),
            size_bytes,
            kind,
            extracted_text: extracted.text,
            status: extracted.status,
            pages: extracted.pages,
        }
    }

    /// Reads a file from disk and extracts it
    ///
    /// A read failure yields a placeholder document rather than an error.
    pub async fn extract_path(&self, path: &Path, mime: Option<&str>) -> UploadedDocument {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match tokio::fs::read(path).await {
            Ok(bytes) => self.extract(&filename, mime, bytes).await,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read upload");
                UploadedDocument {
                    kind: DocumentKind::detect(&filename, mime),
                    extracted_text: unreadable_placeholder(&filename, &e.to_string()),
                    filename,
                    size_bytes: 0,
                    status: ExtractionStatus::Failed,
                    pages: Vec::new(),
                }
            }
        }
    }
}

/// Placeholder used when a file cannot be processed at all
pub(crate) fn unreadable_placeholder(filename: &str, reason: &str) -> String {
    format!(
        "[File {} could not be processed: {}. Please paste the relevant text directly.]",
        filename, reason
    )
}

fn extract_plain_text(filename: &str, bytes: &[u8]) -> Extracted {
    match std::str::from_utf8(bytes) {
        Ok(text) => Extracted::new(text, ExtractionStatus::Ok),
        Err(_) => {
            tracing::debug!(filename, "Plain text upload is not valid UTF-8, decoding lossily");
            Extracted::new(String::from_utf8_lossy(bytes), ExtractionStatus::Partial)
        }
    }
}

fn extract_unsupported(filename: &str, bytes: &[u8]) -> Extracted {
    match std::str::from_utf8(bytes) {
        Ok(text) if !text.trim().is_empty() => Extracted::new(text, ExtractionStatus::Partial),
        _ => Extracted::failed(unreadable_placeholder(
            filename,
            "this file type is not supported",
        )),
    }
}

/// Printable ASCII runs of a binary file, with line breaks preserved
///
/// Runs shorter than `min_run` characters are dropped as noise.
pub(crate) fn scan_printable_text(bytes: &[u8], min_run: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut run = String::new();

    let flush_run = |run: &mut String, line: &mut String| {
        if run.trim().chars().count() >= min_run {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(run.trim());
        }
        run.clear();
    };

    for &byte in bytes {
        match byte {
            b'\r' | b'\n' => {
                flush_run(&mut run, &mut line);
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
            }
            0x20..=0x7e | b'\t' => run.push(byte as char),
            _ => flush_run(&mut run, &mut line),
        }
    }
    flush_run(&mut run, &mut line);
    if !line.is_empty() {
        lines.push(line);
    }

    lines.join("\n")
}
