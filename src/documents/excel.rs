//! Spreadsheet extraction
//!
//! `.xlsx` workbooks are unpacked and each worksheet rendered as CSV under a
//! `--- Sheet: name ---` marker. Legacy `.xls` files only get a byte scan.

use super::{scan_printable_text, unreadable_placeholder, Extracted, ExtractionStatus};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// Extracts every worksheet of an `.xlsx` workbook as CSV text
pub(crate) fn extract_xlsx(filename: &str, bytes: &[u8]) -> Extracted {
    match workbook_text(bytes) {
        Ok((text, _)) if text.trim().is_empty() => Extracted::failed(format!(
            "[Spreadsheet {} contains no sheets with readable data.]",
            filename
        )),
        Ok((text, failed_sheets)) => {
            let status = if failed_sheets > 0 {
                ExtractionStatus::Partial
            } else {
                ExtractionStatus::Ok
            };
            Extracted::new(text, status)
        }
        Err(e) => {
            tracing::warn!(filename, error = %e, "Failed to read workbook");
            Extracted::failed(unreadable_placeholder(filename, &e.to_string()))
        }
    }
}

/// Best-effort recovery of cell text from a legacy `.xls` workbook
pub(crate) fn extract_xls(filename: &str, bytes: &[u8]) -> Extracted {
    let text = scan_printable_text(bytes, 3);
    if text.trim().is_empty() {
        return Extracted::failed(format!(
            "[Spreadsheet {} contains no readable text. Save it as .xlsx and upload it again.]",
            filename
        ));
    }
    Extracted::new(
        format!(
            "{}\n\n[Note: recovered from a legacy .xls file without table structure. \
Save the workbook as .xlsx for sheet-by-sheet extraction.]",
            text
        ),
        ExtractionStatus::Partial,
    )
}

/// Returns the rendered workbook and the number of sheets that failed
fn workbook_text(bytes: &[u8]) -> anyhow::Result<(String, usize)> {
    let mut archive: Archive<'_> = zip::ZipArchive::new(Cursor::new(bytes))?;

    let workbook = read_entry(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| anyhow::anyhow!("xl/workbook.xml is missing"))?;
    let sheets = parse_sheet_list(&workbook)?;

    let relationships = match read_entry(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let shared_strings = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sections = Vec::with_capacity(sheets.len());
    let mut failed = 0;
    for (index, sheet) in sheets.iter().enumerate() {
        let path = relationships
            .get(&sheet.relationship_id)
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let body = match read_entry(&mut archive, &path) {
            Ok(Some(xml)) => match parse_sheet_rows(&xml, &shared_strings) {
                Ok(rows) if rows.is_empty() => "(empty sheet)".to_string(),
                Ok(rows) => rows_to_csv(&rows),
                Err(e) => {
                    failed += 1;
                    format!("[Error reading sheet {}: {}]", sheet.name, e)
                }
            },
            Ok(None) => {
                failed += 1;
                format!("[Error reading sheet {}: {} is missing]", sheet.name, path)
            }
            Err(e) => {
                failed += 1;
                format!("[Error reading sheet {}: {}]", sheet.name, e)
            }
        };
        sections.push(format!("--- Sheet: {} ---\n{}", sheet.name, body));
    }

    Ok((sections.join("\n\n"), failed))
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> anyhow::Result<Option<String>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    Ok(Some(contents))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetEntry {
    name: String,
    relationship_id: String,
}

fn parse_sheet_list(xml: &str) -> anyhow::Result<Vec<SheetEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                let name = attribute(e, b"name")
                    .unwrap_or_else(|| format!("Sheet{}", sheets.len() + 1));
                let relationship_id = attribute(e, b"id").unwrap_or_default();
                sheets.push(SheetEntry {
                    name,
                    relationship_id,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

fn parse_relationships(xml: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id"), attribute(e, b"Target")) {
                    relationships.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

fn parse_shared_strings(xml: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs repeat the text in another script
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text && !in_phonetic => {
                let text = e
                    .unescape()
                    .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                current.push_str(&text);
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("XML parsing error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Zero-based column index from a cell reference such as `AB12`
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let number = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(number - 1)
}

#[derive(Default)]
struct CellState {
    column: Option<usize>,
    cell_type: Option<String>,
    value: String,
    capturing: bool,
}

fn parse_sheet_rows(xml: &str, shared_strings: &[String]) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<CellState> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell = Some(CellState {
                        column: attribute(e, b"r").as_deref().and_then(column_index),
                        cell_type: attribute(e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" | b"t" => {
                    if let Some(state) = cell.as_mut() {
                        state.capturing = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(state) = cell.as_mut().filter(|s| s.capturing) {
                    let text = e
                        .unescape()
                        .map_err(|err| anyhow::anyhow!("XML decode error: {}", err))?;
                    state.value.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(state) = cell.as_mut() {
                        state.capturing = false;
                    }
                }
                b"c" => {
                    if let Some(state) = cell.take() {
                        let column = state.column.unwrap_or(row.len());
                        let value = resolve_cell_value(&state, shared_strings);
                        if row.len() <= column {
                            row.resize(column + 1, String::new());
                        }
                        row[column] = value;
                    }
                }
                b"row" => {
                    while row.last().is_some_and(|v| v.is_empty()) {
                        row.pop();
                    }
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
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

    Ok(rows)
}

fn resolve_cell_value(cell: &CellState, shared_strings: &[String]) -> String {
    match cell.cell_type.as_deref() {
        Some("s") => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| shared_strings.get(idx).cloned())
            .unwrap_or_default(),
        Some("b") => match cell.value.trim() {
            "1" => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        _ => cell.value.clone(),
    }
}

fn rows_to_csv(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|field| csv_field(field))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
