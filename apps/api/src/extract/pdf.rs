use super::ExtractError;

/// The PDF header may be preceded by junk, but only within the first 1 KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Extracts all text in document order. Page breaks come back as form feeds
/// and are collapsed by `normalize_text`.
pub fn extract_pdf_text(data: &[u8]) -> Result<String, ExtractError> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(ExtractError::Extraction(
            "file has a .pdf extension but is not a PDF".to_string(),
        ));
    }

    // pdf-extract panics on some malformed inputs instead of returning an error
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(data)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Extraction(format!("failed to read PDF: {e}"))),
        Err(_) => Err(ExtractError::Extraction(
            "PDF is corrupt or uses an unsupported structure".to_string(),
        )),
    }
}
