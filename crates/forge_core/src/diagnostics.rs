//! Structured error records, severities and the error taxonomy.
//!
//! `ErrorRecord`s are produced by the error detector from tool output and by
//! the syntax validator from generated files. `ErrorKind` is the taxonomy the
//! orchestrator uses when it classifies a failure crossing a component
//! boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How bad an error is. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of problem an error record describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Syntax,
    Build,
    Runtime,
    Dependency,
    Permission,
    Timeout,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Build => "build",
            Self::Runtime => "runtime",
            Self::Dependency => "dependency",
            Self::Permission => "permission",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single structured error parsed from tool output or file validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub auto_fixable: bool,
    pub raw: String,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, error_type: ErrorType, severity: Severity) -> Self {
        let message = message.into();
        Self {
            raw: message.clone(),
            message,
            error_type,
            severity,
            file: None,
            line: None,
            column: None,
            auto_fixable: false,
        }
    }

    /// A syntax error inside a generated file; always auto-fixable.
    pub fn syntax(file: impl Into<String>, line: Option<u32>, message: impl Into<String>) -> Self {
        let mut record = Self::new(message, ErrorType::Syntax, Severity::Error);
        record.file = Some(file.into());
        record.line = line;
        record.auto_fixable = true;
        record
    }

    pub fn with_location(mut self, file: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn auto_fixable(mut self, fixable: bool) -> Self {
        self.auto_fixable = fixable;
        self
    }

    /// Message safe for the public event scope.
    pub fn public_message(&self) -> String {
        user_message(&self.message)
    }

    /// JSON payload used by `error_detected` events.
    pub fn to_event_data(&self) -> serde_json::Value {
        serde_json::json!({
            "message": self.public_message(),
            "type": self.error_type,
            "severity": self.severity,
            "file": self.file,
            "line": self.line,
            "column": self.column,
            "auto_fixable": self.auto_fixable,
        })
    }
}

/// Error taxonomy used when failures cross component boundaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    IntentError,
    PlanError,
    ModelError,
    StreamError,
    WriteError,
    ValidateError,
    ToolError,
    TimeoutError,
    CancelError,
    DeadlockError,
    SecurityError,
    FatalError,
}

impl ErrorKind {
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::ValidateError => Severity::Error,
            Self::IntentError | Self::PlanError | Self::ToolError => Severity::Error,
            Self::ModelError | Self::StreamError | Self::TimeoutError => Severity::Critical,
            Self::WriteError | Self::DeadlockError | Self::SecurityError | Self::FatalError => {
                Severity::Fatal
            }
            Self::CancelError => Severity::Fatal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentError => "intent_error",
            Self::PlanError => "plan_error",
            Self::ModelError => "model_error",
            Self::StreamError => "stream_error",
            Self::WriteError => "write_error",
            Self::ValidateError => "validate_error",
            Self::ToolError => "tool_error",
            Self::TimeoutError => "timeout_error",
            Self::CancelError => "cancel_error",
            Self::DeadlockError => "deadlock_error",
            Self::SecurityError => "security_error",
            Self::FatalError => "fatal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rewrite a raw error message for the public scope.
///
/// Common causes map to a short actionable sentence; everything else is
/// reduced to its first line so stack traces never reach the public scope.
pub fn user_message(raw: &str) -> String {
    let lower = raw.to_lowercase();

    if lower.contains("pubspec.yaml")
        && (lower.contains("not found") || lower.contains("could not find") || lower.contains("missing"))
        || lower.contains("package.json") && (lower.contains("enoent") || lower.contains("not found"))
        || lower.contains("missing manifest")
    {
        return "Project is missing its manifest".to_string();
    }
    if lower.contains("permission denied") || lower.contains("eacces") {
        return "Cannot write files in this location".to_string();
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return "Build took too long".to_string();
    }

    raw.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Unknown error")
        .to_string()
}
