//! Error types for the core module.

use thiserror::Error;

use crate::diagnostics::{ErrorKind, Severity};

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Cycle detected in action graph: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Node '{node}' requires unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("Duplicate action node: {0}")]
    DuplicateNode(String),

    #[error("Action node not found: {0}")]
    NodeNotFound(String),

    #[error("Deadlock: no executable nodes while {} remain pending", pending.join(", "))]
    Deadlock { pending: Vec<String> },

    #[error("Action node '{0}' is not reversible")]
    NotReversible(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Undo of node '{node}' failed: {message}")]
    UndoFailed { node: String, message: String },

    #[error("Invalid transition for node '{node}': {from} -> {to}")]
    InvalidTransition { node: String, from: String, to: String },

    #[error("No callable registered for action '{0}'")]
    UnboundAction(String),

    #[error("A flow is already active (mode={0})")]
    FlowActive(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CycleDetected { .. }
            | Self::UnknownDependency { .. }
            | Self::DuplicateNode(_)
            | Self::UnboundAction(_) => ErrorKind::PlanError,
            Self::Deadlock { .. } => ErrorKind::DeadlockError,
            Self::Cancelled => ErrorKind::CancelError,
            Self::Io(_) => ErrorKind::WriteError,
            Self::FlowActive(_) => ErrorKind::IntentError,
            _ => ErrorKind::FatalError,
        }
    }

    /// Default severity for this error.
    pub fn severity(&self) -> Severity {
        self.kind().default_severity()
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
