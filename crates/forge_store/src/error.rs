//! Error types for the state store.

use forge_core::ErrorKind;
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while saving or loading session state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State file is corrupt: {0}")]
    Corrupt(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Failing to persist is a write error; the flow itself can go on.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::WriteError
    }
}
