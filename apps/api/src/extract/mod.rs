//! Content Extractor: turns an uploaded resume file into plain text.
//!
//! Dispatch is closed over `SourceFormat`; anything else is rejected before
//! any bytes are parsed. Failures here are deterministic and never retried.

use std::path::Path;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::models::resume::{ResumeDocument, SourceFormat};

pub mod docx;
pub mod pdf;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format '{0}' (upload a .pdf, .docx, .doc, or .txt file)")]
    UnsupportedFormat(String),

    #[error("could not read the resume file: {0}")]
    Extraction(String),
}

/// Extracts the text of `data`, choosing the reader from `file_name`'s extension.
pub fn extract(file_name: &str, data: &[u8]) -> Result<ResumeDocument, ExtractError> {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    let format = SourceFormat::from_extension(&ext).ok_or_else(|| {
        ExtractError::UnsupportedFormat(if ext.is_empty() {
            "(none)".to_string()
        } else {
            ext.clone()
        })
    })?;

    let raw = match format {
        SourceFormat::Pdf => pdf::extract_pdf_text(data)?,
        SourceFormat::Docx => docx::extract_docx_text(data)?,
        SourceFormat::Txt => decode_text(data)?,
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        return Err(ExtractError::Extraction(
            "no text found in the file; if it is a scanned document, export a text-based copy and re-upload"
                .to_string(),
        ));
    }

    debug!("Extracted {} chars from {:?} upload", text.len(), format);
    Ok(ResumeDocument { text, format })
}

/// Runs `extract` on the blocking pool; a panic there becomes an `Extraction` error.
pub async fn extract_blocking(file_name: String, data: Bytes) -> Result<ResumeDocument, ExtractError> {
    tokio::task::spawn_blocking(move || extract(&file_name, &data))
        .await
        .map_err(|e| ExtractError::Extraction(format!("extraction task failed: {e}")))?
}

fn decode_text(data: &[u8]) -> Result<String, ExtractError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    String::from_utf8(data.to_vec())
        .map_err(|e| ExtractError::Extraction(format!("text file is not valid UTF-8: {e}")))
}

/// Unifies line endings, turns page breaks into newlines, trims trailing
/// spaces, and collapses runs of blank lines to a single blank line.
fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace(['\r', '\x0c'], "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim().to_string()
}
