//! Error types for the pipeline module.

use forge_core::{ActionError, CoreError, ErrorKind, ErrorRecord, Severity};
use forge_llm::LlmError;
use forge_templates::TemplateError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while planning or generating files.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Planning failed: {0}")]
    Plan(String),

    #[error("Invalid project path '{0}'")]
    InvalidPath(String),

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("{path} failed validation with {} problem(s)", records.len())]
    Validation { path: String, records: Vec<ErrorRecord> },

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Plan(_) | Self::Template(_) => ErrorKind::PlanError,
            Self::InvalidPath(_) | Self::Write { .. } | Self::Io(_) => ErrorKind::WriteError,
            Self::Validation { .. } => ErrorKind::ValidateError,
            Self::Cancelled => ErrorKind::CancelError,
            Self::Llm(e) => e.kind(),
            Self::Core(e) => e.kind(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().default_severity()
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::CancelError
    }
}

impl From<PipelineError> for ActionError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation { path, records } => {
                let message = format!("{} failed validation", path);
                ActionError::new(ErrorKind::ValidateError, message).with_records(records)
            }
            other if other.is_cancelled() => ActionError::cancelled(),
            other => ActionError::new(other.kind(), other.to_string()),
        }
    }
}
