//! Error types for model access.

use forge_core::ErrorKind;
use thiserror::Error;

/// Result type alias for model operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors raised by provider clients and the router.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model call exceeded its {0} ms latency budget")]
    Timeout(u64),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("No model satisfies the constraints for task '{0}'")]
    NoCandidate(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("No client registered for provider '{0}'")]
    NoClient(String),

    #[error("Model call cancelled")]
    Cancelled,
}

impl LlmError {
    /// Errors worth trying the next model for: network, rate limit, 5xx and
    /// timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited(_) | Self::Server { .. } | Self::Timeout(_)
        )
    }

    /// Classify an HTTP status with its response body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Api { status, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Cancelled => ErrorKind::CancelError,
            _ => ErrorKind::ModelError,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None if err.is_decode() => Self::Parse(err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
