//! Word document extraction
//!
//! `.docx` files are unpacked and the body XML walked for text runs.
//! Legacy `.doc` files only get a printable-text byte scan.

use super::{scan_printable_text, unreadable_placeholder, Extracted, ExtractionStatus};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Extracts paragraph text from a `.docx` archive
pub(crate) fn extract_docx(filename: &str, bytes: &[u8]) -> Extracted {
    match docx_text(bytes) {
        Ok(text) if text.trim().is_empty() => Extracted::failed(no_text_placeholder(filename)),
        Ok(text) => Extracted::new(text, ExtractionStatus::Ok),
        Err(e) => {
            tracing::warn!(filename, error = %e, "Failed to read Word document");
            Extracted::failed(unreadable_placeholder(filename, &e.to_string()))
        }
    }
}

/// Best-effort recovery of text from a legacy binary `.doc` file
pub(crate) fn extract_doc(filename: &str, bytes: &[u8]) -> Extracted {
    let text = scan_printable_text(bytes, 4);
    if text.trim().is_empty() {
        return Extracted::failed(no_text_placeholder(filename));
    }
    Extracted::new(
        format!(
            "{}\n\n[Note: recovered from a legacy .doc file; formatting and some text may be missing. \
Save the document as .docx for a complete extraction.]",
            text
        ),
        ExtractionStatus::Partial,
    )
}

fn no_text_placeholder(filename: &str) -> String {
    format!(
        "[Word document {} contains no readable text. It may consist of images or scanned pages. \
Please paste the relevant text directly.]",
        filename
    )
}

fn docx_text(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| anyhow::anyhow!("word/document.xml is missing"))?
        .read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml)
}

/// Collects `w:t` runs, one line per `w:p` paragraph
fn paragraphs_from_xml(xml: &str) -> anyhow::Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                current.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = std::mem::take(&mut current);
                    if !paragraph.trim().is_empty() {
                        paragraphs.push(paragraph.trim_end().to_string());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    if !current.trim().is_empty() {
        paragraphs.push(current.trim_end().to_string());
    }

    Ok(paragraphs.join("\n"))
}
