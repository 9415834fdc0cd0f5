//! Format Exporter: one final markdown document out as markdown, HTML and PDF.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub mod font_metrics;
pub mod html;
pub mod pdf;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("document has no printable content")]
    EmptyDocument,

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

/// All three formats, produced together from the same markdown.
/// A PDF failure leaves `pdf` empty and the reason in `pdf_error`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedOutput {
    pub markdown: String,
    pub html: String,
    #[serde(skip)]
    pub pdf: Option<Vec<u8>>,
    pub pdf_error: Option<String>,
}

pub fn export(markdown: &str) -> RenderedOutput {
    let html = html::render_document(markdown);

    let (pdf, pdf_error) = match pdf::html_to_pdf(&html) {
        Ok(bytes) => {
            debug!("Rendered PDF: {} bytes", bytes.len());
            (Some(bytes), None)
        }
        Err(e) => {
            warn!("PDF render failed, returning markdown and HTML only: {e}");
            (None, Some(e.to_string()))
        }
    };

    RenderedOutput {
        markdown: markdown.to_string(),
        html,
        pdf,
        pdf_error,
    }
}

/// `export` on the blocking pool; layout is CPU-bound.
pub async fn export_blocking(markdown: String) -> Result<RenderedOutput, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || export(&markdown)).await
}
