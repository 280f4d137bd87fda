//! Document format detection

use crate::error::{Result, ResumeMatchError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Parse a declared format tag: an extension (`pdf`, `.docx`) or a MIME type
    pub fn from_tag(tag: &str) -> Result<Self> {
        let normalized = tag.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "pdf" | "application/pdf" => Ok(DocumentFormat::Pdf),
            "docx"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(DocumentFormat::Docx)
            }
            _ => Err(ResumeMatchError::UnsupportedFormat(format!(
                "'{}' (supported: pdf, docx)",
                tag
            ))),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Pdf => write!(f, "pdf"),
            DocumentFormat::Docx => write!(f, "docx"),
        }
    }
}
