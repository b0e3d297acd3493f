//! Tool runner trait.

use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::command::{CommandSpec, ExecOutput, StreamLine};
use crate::error::RunnerResult;

/// Lines of a running command, ending with [`StreamLine::Exit`].
pub type LineStream = Pin<Box<dyn Stream<Item = StreamLine> + Send>>;

/// Abstract command execution.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion and capture output.
    async fn exec(&self, spec: &CommandSpec) -> RunnerResult<ExecOutput>;

    /// Run and yield output lines as they arrive.
    async fn exec_stream(&self, spec: &CommandSpec) -> RunnerResult<LineStream>;
}

/// Consume a line stream, calling `on_line` for every output line, and
/// assemble the captured result.
pub async fn drain_stream(mut stream: LineStream, mut on_line: impl FnMut(&StreamLine)) -> ExecOutput {
    let started = Instant::now();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = -1;

    while let Some(line) = stream.next().await {
        match &line {
            StreamLine::Stdout(text) => stdout.push(text.clone()),
            StreamLine::Stderr(text) => stderr.push(text.clone()),
            StreamLine::Exit(code) => {
                exit_code = *code;
                break;
            }
        }
        on_line(&line);
    }

    ExecOutput {
        exit_code,
        stdout: stdout.join("\n"),
        stderr: stderr.join("\n"),
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_stream_collects_until_exit() {
        let lines = vec![
            StreamLine::Stdout("a".into()),
            StreamLine::Stderr("b".into()),
            StreamLine::Stdout("c".into()),
            StreamLine::Exit(2),
        ];
        let stream: LineStream = Box::pin(futures::stream::iter(lines));
        let mut seen = 0;
        let out = drain_stream(stream, |_| seen += 1).await;
        assert_eq!(seen, 3);
        assert_eq!(out.exit_code, 2);
        assert_eq!(out.stdout, "a\nc");
        assert_eq!(out.stderr, "b");
    }
}
