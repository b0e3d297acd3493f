//! Command and output types.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use forge_core::CancellationToken;
use serde::{Deserialize, Serialize};

/// Cap on a single command unless the caller sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A shell command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    pub env: HashMap<String, String>,
    pub cancel: CancellationToken,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            timeout: DEFAULT_TIMEOUT,
            env: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecOutput {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// One item of a streamed command. `Exit` is always the last item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "stream", content = "value")]
pub enum StreamLine {
    Stdout(String),
    Stderr(String),
    Exit(i32),
}

impl StreamLine {
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }

    /// Line text, `None` for the exit sentinel.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Stdout(line) | Self::Stderr(line) => Some(line),
            Self::Exit(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_output() {
        let out = ExecOutput {
            exit_code: 1,
            stdout: "out".into(),
            stderr: "err".into(),
            duration_ms: 5,
        };
        assert_eq!(out.combined_output(), "out\nerr");
        assert!(!out.success());
    }

    #[test]
    fn test_spec_defaults() {
        let spec = CommandSpec::new("npm install").cwd("/tmp/app");
        assert_eq!(spec.timeout, DEFAULT_TIMEOUT);
        assert_eq!(spec.cwd.as_deref(), Some(std::path::Path::new("/tmp/app")));
    }
}
