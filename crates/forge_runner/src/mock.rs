//! Mock tool runner for testing.
//!
//! Responses are scripted per command substring. Each rule holds a queue of
//! responses: calls consume the queue in order and the last response repeats
//! once it is exhausted. Commands matching no rule succeed with empty output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::command::{CommandSpec, ExecOutput, StreamLine};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{LineStream, ToolRunner};

/// Predefined mock response for a command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    /// Simulated run time before the response is returned.
    pub delay: Duration,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
            delay: Duration::ZERO,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
            delay: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn to_output(&self) -> ExecOutput {
        ExecOutput {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            duration_ms: self.duration_ms,
        }
    }

    fn to_lines(&self) -> Vec<StreamLine> {
        let mut lines: Vec<StreamLine> = self
            .stdout
            .lines()
            .map(|l| StreamLine::Stdout(l.to_string()))
            .collect();
        lines.extend(self.stderr.lines().map(|l| StreamLine::Stderr(l.to_string())));
        lines.push(StreamLine::Exit(self.exit_code));
        lines
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedCall {
    pub method: String,
    pub command: String,
    pub cwd: Option<String>,
    pub timeout_secs: u64,
}

struct Rule {
    pattern: String,
    responses: Vec<MockResponse>,
    next: usize,
}

/// Mock tool runner for testing.
#[derive(Clone, Default)]
pub struct MockToolRunner {
    rules: Arc<RwLock<Vec<Rule>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockToolRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next response for commands containing `pattern`.
    pub fn respond(self, pattern: impl Into<String>, response: MockResponse) -> Self {
        let pattern = pattern.into();
        {
            let mut rules = self.rules.write();
            match rules.iter_mut().find(|r| r.pattern == pattern) {
                Some(rule) => rule.responses.push(response),
                None => rules.push(Rule {
                    pattern,
                    responses: vec![response],
                    next: 0,
                }),
            }
        }
        self
    }

    /// Make every call fail with a spawn error.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Commands run so far, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.command.clone())
            .collect()
    }

    /// Number of calls whose command contains `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.command.contains(pattern))
            .count()
    }

    fn record_call(&self, method: &str, spec: &CommandSpec) {
        self.captured_calls.write().push(CapturedCall {
            method: method.to_string(),
            command: spec.command.clone(),
            cwd: spec.cwd.as_ref().map(|p| p.display().to_string()),
            timeout_secs: spec.timeout.as_secs(),
        });
    }

    fn next_response(&self, command: &str) -> MockResponse {
        let mut rules = self.rules.write();
        match rules.iter_mut().find(|r| command.contains(r.pattern.as_str())) {
            Some(rule) => {
                let index = rule.next.min(rule.responses.len().saturating_sub(1));
                rule.next += 1;
                rule.responses
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| MockResponse::success(""))
            }
            None => MockResponse::success(""),
        }
    }

    fn check_failure(&self, spec: &CommandSpec) -> RunnerResult<()> {
        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::SpawnFailed {
                command: spec.command.clone(),
                message: msg,
            });
        }
        Ok(())
    }

    async fn wait(&self, spec: &CommandSpec, delay: Duration) -> RunnerResult<()> {
        if spec.cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        if delay.is_zero() {
            return Ok(());
        }
        if delay > spec.timeout {
            return Err(RunnerError::Timeout(spec.timeout.as_secs()));
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = spec.cancel.cancelled() => Err(RunnerError::Cancelled),
        }
    }
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    async fn exec(&self, spec: &CommandSpec) -> RunnerResult<ExecOutput> {
        self.record_call("exec", spec);
        self.check_failure(spec)?;
        let response = self.next_response(&spec.command);
        self.wait(spec, response.delay).await?;
        Ok(response.to_output())
    }

    async fn exec_stream(&self, spec: &CommandSpec) -> RunnerResult<LineStream> {
        self.record_call("exec_stream", spec);
        self.check_failure(spec)?;
        let response = self.next_response(&spec.command);
        self.wait(spec, response.delay).await?;
        Ok(Box::pin(futures::stream::iter(response.to_lines())))
    }
}
