//! Shell command runner on `tokio::process`.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::command::{CommandSpec, ExecOutput, StreamLine};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{LineStream, ToolRunner};

/// Exit code reported when a streamed command times out or is cancelled.
const ABORTED_EXIT_CODE: i32 = -1;

/// Runs commands through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn(&self, spec: &CommandSpec) -> RunnerResult<Child> {
        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut command = Command::new(shell);
        command
            .arg(shell_arg)
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(command = %spec.command, cwd = ?spec.cwd, "Spawning command");
        command.spawn().map_err(|e| RunnerError::SpawnFailed {
            command: spec.command.clone(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ToolRunner for ShellRunner {
    async fn exec(&self, spec: &CommandSpec) -> RunnerResult<ExecOutput> {
        if spec.cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        let started = Instant::now();
        let mut child = self.spawn(spec)?;

        // Read stdout and stderr concurrently so neither pipe fills up.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    lines.push(line);
                }
            }
            lines
        });
        let stderr_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    lines.push(line);
                }
            }
            lines
        });

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep(spec.timeout) => {
                let _ = child.kill().await;
                warn!(command = %spec.command, "Command timed out");
                return Err(RunnerError::Timeout(spec.timeout.as_secs()));
            }
            _ = spec.cancel.cancelled() => {
                let _ = child.kill().await;
                info!(command = %spec.command, "Command cancelled");
                return Err(RunnerError::Cancelled);
            }
        };

        let stdout_lines = stdout_task.await.unwrap_or_default();
        let stderr_lines = stderr_task.await.unwrap_or_default();
        let output = ExecOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: stdout_lines.join("\n"),
            stderr: stderr_lines.join("\n"),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        debug!(command = %spec.command, exit_code = output.exit_code, duration_ms = output.duration_ms, "Command finished");
        Ok(output)
    }

    async fn exec_stream(&self, spec: &CommandSpec) -> RunnerResult<LineStream> {
        if spec.cancel.is_cancelled() {
            return Err(RunnerError::Cancelled);
        }
        let mut child = self.spawn(spec)?;
        let (tx, rx) = mpsc::channel::<StreamLine>(256);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_tx = tx.clone();
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if out_tx.send(StreamLine::Stdout(line)).await.is_err() {
                        break;
                    }
                }
            }
        });
        let err_tx = tx.clone();
        let stderr_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if err_tx.send(StreamLine::Stderr(line)).await.is_err() {
                        break;
                    }
                }
            }
        });

        let timeout = spec.timeout;
        let cancel = spec.cancel.clone();
        let command = spec.command.clone();
        tokio::spawn(async move {
            let exit_code = tokio::select! {
                status = child.wait() => {
                    let _ = stdout_task.await;
                    let _ = stderr_task.await;
                    match status {
                        Ok(status) => status.code().unwrap_or(-1),
                        Err(e) => {
                            let _ = tx.send(StreamLine::Stderr(e.to_string())).await;
                            -1
                        }
                    }
                }
                _ = tokio::time::sleep(timeout) => {
                    let _ = child.kill().await;
                    warn!(command = %command, "Streamed command timed out");
                    let _ = tx
                        .send(StreamLine::Stderr(format!("Command timed out after {} seconds", timeout.as_secs())))
                        .await;
                    ABORTED_EXIT_CODE
                }
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    info!(command = %command, "Streamed command cancelled");
                    ABORTED_EXIT_CODE
                }
            };
            let _ = tx.send(StreamLine::Exit(exit_code)).await;
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    use forge_core::CancellationToken;

    use crate::runner::drain_stream;

    #[tokio::test]
    async fn test_exec_captures_output() {
        let runner = ShellRunner::new();
        let out = runner
            .exec(&CommandSpec::new("echo hello; echo oops 1>&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stderr, "oops");
    }

    #[tokio::test]
    async fn test_exec_respects_cwd() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "x").unwrap();
        let out = ShellRunner::new()
            .exec(&CommandSpec::new("ls").cwd(temp.path()))
            .await
            .unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_exec_times_out() {
        let err = ShellRunner::new()
            .exec(&CommandSpec::new("sleep 5").timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_exec_cancelled() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });
        let err = ShellRunner::new()
            .exec(&CommandSpec::new("sleep 5").cancel(token))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Cancelled));
    }

    #[tokio::test]
    async fn test_exec_stream_ends_with_exit_sentinel() {
        let stream = ShellRunner::new()
            .exec_stream(&CommandSpec::new("echo one; echo two"))
            .await
            .unwrap();
        let mut lines = Vec::new();
        let out = drain_stream(stream, |l| lines.push(l.clone())).await;
        assert_eq!(out.exit_code, 0);
        assert_eq!(
            lines,
            vec![StreamLine::Stdout("one".into()), StreamLine::Stdout("two".into())]
        );
    }
}
