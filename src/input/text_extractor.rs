//! Text extraction from PDF and DOCX byte streams

use crate::error::{Result, ResumeMatchError};
use log::{debug, warn};
use regex::Regex;
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};

/// Blocking bytes-to-text conversion for one document format.
///
/// Implementations return raw text in document order; whitespace
/// normalisation happens in the input manager.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }

        // pdf-extract panics on some malformed object streams
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes)
        }));

        match outcome {
            Ok(Ok(text)) => {
                debug!("Extracted {} characters from PDF", text.len());
                Ok(text)
            }
            Ok(Err(e)) => Err(ResumeMatchError::CorruptDocument(format!(
                "Failed to extract text from PDF: {}",
                e
            ))),
            Err(_) => {
                warn!("PDF backend panicked on a {} byte document", bytes.len());
                Err(ResumeMatchError::CorruptDocument(
                    "PDF structure could not be parsed".to_string(),
                ))
            }
        }
    }
}

const DOCX_BODY: &str = "word/document.xml";

pub struct DocxExtractor {
    paragraph_end: Regex,
    line_break: Regex,
    tab: Regex,
    tag: Regex,
    numeric_entity: Regex,
}

impl DocxExtractor {
    pub fn new() -> Result<Self> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ResumeMatchError::Configuration(format!("Invalid DOCX pattern '{}': {}", pattern, e))
            })
        };

        Ok(Self {
            paragraph_end: build(r"</w:p>")?,
            line_break: build(r"<w:(?:br|cr)\b[^>]*/>")?,
            tab: build(r"<w:tab\b[^>]*/>")?,
            tag: build(r"<[^>]*>")?,
            numeric_entity: build(r"&#(x[0-9a-fA-F]+|[0-9]+);")?,
        })
    }

    fn read_body(&self, bytes: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| {
            ResumeMatchError::CorruptDocument(format!("DOCX is not a valid zip archive: {}", e))
        })?;

        let mut body = archive.by_name(DOCX_BODY).map_err(|e| {
            ResumeMatchError::CorruptDocument(format!("DOCX is missing {}: {}", DOCX_BODY, e))
        })?;

        let mut xml = String::new();
        body.read_to_string(&mut xml).map_err(|e| {
            ResumeMatchError::CorruptDocument(format!("Failed to read {}: {}", DOCX_BODY, e))
        })?;
        Ok(xml)
    }

    fn xml_to_text(&self, xml: &str) -> String {
        let text = self.paragraph_end.replace_all(xml, "\n");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.tab.replace_all(&text, " ");
        let text = self.tag.replace_all(&text, "");
        self.decode_entities(&text)
    }

    fn decode_entities(&self, text: &str) -> String {
        let decoded = self.numeric_entity.replace_all(text, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        });

        decoded
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }
}

impl TextExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            return Ok(String::new());
        }

        let xml = self.read_body(bytes)?;
        let text = self.xml_to_text(&xml);
        debug!("Extracted {} characters from DOCX", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCX_BODY, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs_in_order() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Jane Smith</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Rust &amp; Python</w:t></w:r><w:r><w:tab/><w:t>SQL</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let extractor = DocxExtractor::new().unwrap();

        let text = extractor.extract(&docx_with_body(xml)).unwrap();
        let jane = text.find("Jane Smith").unwrap();
        let skills = text.find("Rust & Python").unwrap();
        assert!(jane < skills);
        assert!(text.contains("SQL"));
    }

    #[test]
    fn test_numeric_entities_decoded() {
        let extractor = DocxExtractor::new().unwrap();
        assert_eq!(extractor.decode_entities("caf&#233; &#x41;"), "café A");
    }

    #[test]
    fn test_empty_bytes_yield_empty_text() {
        assert_eq!(PdfExtractor.extract(&[]).unwrap(), "");
        assert_eq!(DocxExtractor::new().unwrap().extract(&[]).unwrap(), "");
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let garbage = b"definitely not a document";
        let err = DocxExtractor::new().unwrap().extract(garbage).unwrap_err();
        assert!(matches!(err, ResumeMatchError::CorruptDocument(_)));

        let err = PdfExtractor.extract(garbage).unwrap_err();
        assert!(matches!(err, ResumeMatchError::CorruptDocument(_)));
    }

    #[test]
    fn test_zip_without_body_is_corrupt() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("readme.txt", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = DocxExtractor::new().unwrap().extract(&bytes).unwrap_err();
        assert!(matches!(err, ResumeMatchError::CorruptDocument(_)));
    }
}
