//! Plain-text extraction from uploaded assignments.
//!
//! Extraction never fails outright: an unreadable page, a corrupt archive or
//! an unsupported MIME type degrade to empty text and a warning in the log.

use std::io::{Cursor, Read};

use quick_xml::{events::Event, Reader as XmlReader};
use tracing::{debug, warn};
use zip::ZipArchive;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const GENERIC_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Unsupported,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == PDF_MIME {
            DocumentKind::Pdf
        } else if essence.starts_with(DOCX_MIME) {
            DocumentKind::Docx
        } else {
            DocumentKind::Unsupported
        }
    }
}

/// Picks the MIME type to extract with: the declared one when it is
/// specific, otherwise a guess from the uploaded filename.
pub fn resolve_mime(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && !mime.eq_ignore_ascii_case(GENERIC_MIME) => {
            mime.to_string()
        }
        _ => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or(GENERIC_MIME)
            .to_string(),
    }
}

pub fn extract(bytes: &[u8], mime: &str) -> String {
    let text = match DocumentKind::from_mime(mime) {
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Unsupported => {
            warn!(mime, "Unsupported document type, no text extracted");
            String::new()
        }
    };
    debug!(bytes = bytes.len(), chars = text.chars().count(), "Extraction finished");
    text
}

fn extract_pdf(bytes: &[u8]) -> String {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "Failed to load PDF, no text extracted");
            return String::new();
        }
    };

    // get_pages is keyed by page number, so iteration is in page order
    doc.get_pages()
        .keys()
        .map(|&page_num| match doc.extract_text(&[page_num]) {
            Ok(text) => text.trim_end_matches(['\r', '\n']).to_string(),
            Err(e) => {
                warn!(page = page_num, error = %e, "Failed to extract text from page");
                String::new()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_docx(bytes: &[u8]) -> String {
    match docx_paragraphs(bytes) {
        Ok(paragraphs) => paragraphs.join("\n"),
        Err(e) => {
            warn!(error = %e, "Failed to read DOCX, no text extracted");
            String::new()
        }
    }
}

/// Body paragraphs of a DOCX in document order. Paragraphs nested in tables
/// or text boxes are not part of the sequence; text-box content also stays
/// out of the paragraph that anchors it.
fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {}", e))?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut reader = XmlReader::from_str(&xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut table_depth = 0usize;
    let mut txbx_depth = 0usize;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        let body_level = table_depth == 0 && txbx_depth == 0;
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:txbxContent" => txbx_depth += 1,
                b"w:p" if body_level => current = Some(String::new()),
                b"w:r" => run_depth += 1,
                b"w:t" if txbx_depth == 0 => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.name().as_ref() {
                b"w:p" if body_level => paragraphs.push(String::new()),
                b"w:tab" if run_depth > 0 && txbx_depth == 0 => push_char(&mut current, '\t'),
                b"w:br" | b"w:cr" if run_depth > 0 && txbx_depth == 0 => {
                    push_char(&mut current, '\n')
                }
                _ => {}
            },
            Event::Text(e) if in_text => {
                if let Some(paragraph) = current.as_mut() {
                    paragraph.push_str(&e.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:txbxContent" => txbx_depth = txbx_depth.saturating_sub(1),
                b"w:p" if body_level => {
                    if let Some(paragraph) = current.take() {
                        paragraphs.push(paragraph);
                    }
                }
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

fn push_char(current: &mut Option<String>, c: char) {
    if let Some(paragraph) = current.as_mut() {
        paragraph.push(c);
    }
}
