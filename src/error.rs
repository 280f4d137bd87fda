//! Error handling for the resume matcher

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResumeMatchError {
    #[error("File format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Incompatible embeddings: resume vector from '{resume_model}', job vector from '{job_model}'")]
    IncompatibleEmbeddings {
        resume_model: String,
        job_model: String,
    },

    #[error("Model loading error: {0}")]
    ModelLoad(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    TaskFailed(String),
}

/// Payload-free discriminant of [`ResumeMatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    CorruptDocument,
    InvalidInput,
    IncompatibleEmbeddings,
    ModelLoad,
    Timeout,
    Io,
    Configuration,
    Serialization,
    TaskFailed,
}

impl ResumeMatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResumeMatchError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            ResumeMatchError::CorruptDocument(_) => ErrorKind::CorruptDocument,
            ResumeMatchError::InvalidInput(_) => ErrorKind::InvalidInput,
            ResumeMatchError::IncompatibleEmbeddings { .. } => ErrorKind::IncompatibleEmbeddings,
            ResumeMatchError::ModelLoad(_) => ErrorKind::ModelLoad,
            ResumeMatchError::Timeout { .. } => ErrorKind::Timeout,
            ResumeMatchError::Io(_) => ErrorKind::Io,
            ResumeMatchError::Configuration(_) => ErrorKind::Configuration,
            ResumeMatchError::Serialization(_) => ErrorKind::Serialization,
            ResumeMatchError::TaskFailed(_) => ErrorKind::TaskFailed,
        }
    }

    /// Whether a caller can skip the failing item and keep serving requests.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ResumeMatchError::ModelLoad(_) | ResumeMatchError::Configuration(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ResumeMatchError>;

/// The embedding model loader reports failures through anyhow
impl From<anyhow::Error> for ResumeMatchError {
    fn from(err: anyhow::Error) -> Self {
        ResumeMatchError::ModelLoad(format!("{:#}", err))
    }
}
