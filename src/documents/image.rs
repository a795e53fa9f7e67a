//! Image uploads
//!
//! No OCR is attempted. The extractor reports what it can about the image
//! and asks the user to describe it; optionally the image is embedded as a
//! data URL for vision-capable deployments.

use super::{Extracted, ExtractionStatus};
use base64::Engine;
use std::io::Cursor;

/// Label that precedes an embedded data URL in message text
pub const IMAGE_DATA_LABEL: &str = "Image data (base64-encoded for vision analysis):";

/// Basic facts about an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// MIME type derived from the image header
    pub mime: &'static str,
}

/// Reads format and dimensions from the image header
pub fn probe_image(bytes: &[u8]) -> Option<ImageMetadata> {
    let reader = ::image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let format = reader.format()?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageMetadata {
        width,
        height,
        mime: format.to_mime_type(),
    })
}

/// Encodes bytes as a `data:` URL
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Produces guidance text for an uploaded image
pub(crate) fn describe_image(
    filename: &str,
    declared_mime: Option<&str>,
    bytes: &[u8],
    inline: bool,
) -> Extracted {
    let metadata = probe_image(bytes);

    let header = match &metadata {
        Some(meta) => format!(
            "[IMAGE: {} ({}x{} pixels, {})]",
            filename, meta.width, meta.height, meta.mime
        ),
        None => format!("[IMAGE: {} (the image could not be decoded)]", filename),
    };

    let mut text = format!(
        "{}\nText inside images is not extracted automatically. Please describe what the image shows \
or paste any text it contains. For scanned documents, convert them to a searchable PDF first.",
        header
    );

    let mime: Option<&str> = metadata
        .as_ref()
        .map(|m| m.mime)
        .or(declared_mime.filter(|m| m.starts_with("image/")));

    match (inline, mime) {
        (true, Some(mime)) => {
            text.push_str("\n\n");
            text.push_str(IMAGE_DATA_LABEL);
            text.push('\n');
            text.push_str(&to_data_url(mime, bytes));
            Extracted::new(text, ExtractionStatus::Ok)
        }
        _ if metadata.is_none() => Extracted::new(text, ExtractionStatus::Failed),
        _ => Extracted::new(text, ExtractionStatus::Partial),
    }
}
