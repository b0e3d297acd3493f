//! Error types for the kernel.

use forge_core::{CoreError, ErrorKind, Severity};
use forge_llm::LlmError;
use forge_pipeline::PipelineError;
use forge_runner::RunnerError;
use forge_store::StoreError;
use thiserror::Error;

/// Result type alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Errors surfaced by the orchestrator.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("No project to work on. Describe an app first")]
    NoProject,

    #[error("Command blocked by security level {level}: {command}")]
    Security { level: String, command: String },

    #[error("Nothing to run in '{0}'")]
    EmptyCommand(String),

    #[error("Flow stopped at {node}: {message}")]
    FlowFailed { node: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Corrupt session context: {0}")]
    Context(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl KernelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoProject | Self::EmptyCommand(_) => ErrorKind::IntentError,
            Self::Security { .. } => ErrorKind::SecurityError,
            Self::FlowFailed { .. } => ErrorKind::FatalError,
            Self::Cancelled => ErrorKind::CancelError,
            Self::Context(_) => ErrorKind::FatalError,
            Self::Core(e) => e.kind(),
            Self::Pipeline(e) => e.kind(),
            Self::Llm(e) => e.kind(),
            Self::Runner(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().default_severity()
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Core(CoreError::Cancelled) => true,
            Self::Pipeline(e) => e.is_cancelled(),
            Self::Llm(LlmError::Cancelled) => true,
            Self::Runner(RunnerError::Cancelled) => true,
            _ => false,
        }
    }
}
