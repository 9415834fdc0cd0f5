//! DOCX text extraction: unzip the package, stream `word/document.xml`,
//! and keep run text in document order with paragraph breaks.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::ExtractError;

const DOCUMENT_PART: &str = "word/document.xml";

pub fn extract_docx_text(data: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(|e| {
        ExtractError::Extraction(format!("not a valid Word document (zip container): {e}"))
    })?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractError::Extraction(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Extraction(format!("failed to read {DOCUMENT_PART}: {e}")))?;

    document_xml_to_text(&xml)
}

/// Walks WordprocessingML and emits the text of `w:t` runs.
///
/// `w:tab` inside a run becomes a tab; `w:br`/`w:cr` a newline; the end of
/// every `w:p` a newline. Tab stops in paragraph properties are ignored.
fn document_xml_to_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut out = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" if in_run => in_text = true,
                _ => {}
            },

            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" if in_run => out.push('\t'),
                b"br" | b"cr" if in_run => out.push('\n'),
                // An empty paragraph is still a paragraph break
                b"p" => out.push('\n'),
                _ => {}
            },

            Ok(Event::Text(ref e)) if in_text => {
                let text = e.unescape().map_err(|err| {
                    ExtractError::Extraction(format!("malformed text in {DOCUMENT_PART}: {err}"))
                })?;
                out.push_str(&text);
            }

            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => in_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },

            Ok(Event::Eof) => break,

            Err(e) => {
                return Err(ExtractError::Extraction(format!(
                    "malformed {DOCUMENT_PART}: {e}"
                )))
            }

            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    /// Wraps paragraph XML in a minimal `.docx` package.
    pub(crate) fn build_docx(paragraphs_xml: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{paragraphs_xml}</w:body></w:document>"#
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_in_order() {
        let docx = build_docx(
            r#"<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
               <w:p><w:r><w:t xml:space="preserve">MARKER-DOCX </w:t></w:r><w:r><w:t>Engineer</w:t></w:r></w:p>"#,
        );
        let text = extract_docx_text(&docx).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Jane Doe", "MARKER-DOCX Engineer"]);
    }

    #[test]
    fn test_tabs_breaks_and_entities() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
                 <w:r><w:t>Rust</w:t><w:tab/><w:t>R&amp;D</w:t><w:br/><w:t>Go</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = document_xml_to_text(xml).unwrap();
        assert_eq!(text.trim_end(), "Rust\tR&D\nGo");
    }

    #[test]
    fn test_empty_paragraph_keeps_break() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>A</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>B</w:t></w:r></w:p>
            </w:body></w:document>"#;
        assert_eq!(document_xml_to_text(xml).unwrap(), "A\n\nB\n");
    }

    #[test]
    fn test_not_a_zip_is_extraction_error() {
        let err = extract_docx_text(b"plain text pretending to be docx").unwrap_err();
        assert!(matches!(err, ExtractError::Extraction(_)));
    }

    #[test]
    fn test_zip_without_document_part_is_extraction_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("readme.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let err = extract_docx_text(&data).unwrap_err();
        assert!(err.to_string().contains(DOCUMENT_PART));
    }
}
