//! Error types for the runner module.

use forge_core::ErrorKind;
use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur during runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to start '{command}': {message}")]
    SpawnFailed { command: String, message: String },

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Command cancelled")]
    Cancelled,

    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Cancelled => ErrorKind::CancelError,
            _ => ErrorKind::ToolError,
        }
    }
}
