//! Server-side PDF text extraction, used when the browser could not extract
//! the CV text itself.

use thiserror::Error;
use tracing::{debug, warn};

/// PDF signature every valid file starts with.
const PDF_MAGIC: &[u8] = b"%PDF";
/// Extracted text shorter than this is treated as a scanned document.
const MIN_TEXT_CHARS: usize = 40;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("uploaded file is not a PDF")]
    NotPdf,

    #[error("PDF text extraction failed: {0}")]
    Extract(String),

    #[error("PDF has no extractable text (scanned document?)")]
    NoText,
}

/// Extracts and normalizes the text layer of a PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(ExtractionError::NotPdf);
    }

    let raw = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        warn!("pdf-extract failed: {e}");
        ExtractionError::Extract(e.to_string())
    })?;

    let text = normalize_text(&raw);
    debug!("Extracted {} chars of PDF text", text.chars().count());
    if text.chars().filter(|c| !c.is_whitespace()).count() < MIN_TEXT_CHARS {
        return Err(ExtractionError::NoText);
    }
    Ok(text)
}

/// Trims every line, collapses inner whitespace and keeps at most one blank
/// line between paragraphs.
pub fn normalize_text(raw: &str) -> String {
    let mut out = Vec::new();
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push(line);
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}
