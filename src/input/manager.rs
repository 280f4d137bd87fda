//! Input manager routing documents to format extractors

use crate::error::Result;
use crate::input::file_detector::DocumentFormat;
use crate::input::text_extractor::{DocxExtractor, PdfExtractor, TextExtractor};
use crate::processing::text_processor::TextProcessor;
use crate::runtime::run_blocking;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

pub const EXTRACTION_OPERATION: &str = "text extraction";

/// Raw document bytes plus their declared format
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: Vec<u8>,
    pub format: DocumentFormat,
}

impl Document {
    pub fn new(content: Vec<u8>, format: DocumentFormat) -> Self {
        Self { content, format }
    }

    /// Build from a declared tag such as `pdf`, `docx` or a MIME type
    pub fn from_tag(content: Vec<u8>, tag: &str) -> Result<Self> {
        Ok(Self::new(content, DocumentFormat::from_tag(tag)?))
    }
}

pub struct InputManager {
    pdf: PdfExtractor,
    docx: DocxExtractor,
    processor: TextProcessor,
}

impl InputManager {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pdf: PdfExtractor,
            docx: DocxExtractor::new()?,
            processor: TextProcessor::new(),
        })
    }

    /// Extract and normalise the text of a document.
    ///
    /// An empty or image-only document yields an empty string.
    pub fn extract_text(&self, document: &Document) -> Result<String> {
        let raw = match document.format {
            DocumentFormat::Pdf => self.pdf.extract(&document.content)?,
            DocumentFormat::Docx => self.docx.extract(&document.content)?,
        };

        let text = self.processor.normalize(&raw);
        debug!(
            "Extracted {} normalised characters from {} byte {} document",
            text.len(),
            document.content.len(),
            document.format
        );
        Ok(text)
    }

    /// Run extraction on the blocking pool, discarding the result if it
    /// does not finish within `timeout`.
    pub async fn extract_text_with_timeout(
        self: Arc<Self>,
        document: Document,
        timeout: Duration,
    ) -> Result<String> {
        run_blocking(EXTRACTION_OPERATION, timeout, move || self.extract_text(&document)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResumeMatchError;

    #[test]
    fn test_empty_document_each_format() {
        let manager = InputManager::new().unwrap();
        for format in [DocumentFormat::Pdf, DocumentFormat::Docx] {
            let text = manager.extract_text(&Document::new(Vec::new(), format)).unwrap();
            assert_eq!(text, "");
        }
    }

    #[test]
    fn test_unsupported_tag() {
        let err = Document::from_tag(b"{\\rtf1}".to_vec(), "rtf").unwrap_err();
        assert!(matches!(err, ResumeMatchError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_timeout_wrapper_passes_result_through() {
        let manager = Arc::new(InputManager::new().unwrap());
        let doc = Document::new(b"garbage".to_vec(), DocumentFormat::Docx);

        let err = manager
            .extract_text_with_timeout(doc, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeMatchError::CorruptDocument(_)));
    }
}
