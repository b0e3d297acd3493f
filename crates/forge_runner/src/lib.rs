//! # forge_runner
//!
//! Command execution for AppForge.
//!
//! Dependency installs, builds, previews and git commands all go through the
//! [`ToolRunner`] contract. Output is either captured whole ([`ToolRunner::exec`])
//! or delivered line by line with a final exit sentinel
//! ([`ToolRunner::exec_stream`]).
//!
//! # Runners
//!
//! - **ShellRunner**: `sh -c` (or `cmd /C`) on `tokio::process`
//! - **MockToolRunner**: Scripted responses and captured calls for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use forge_runner::{CommandSpec, ShellRunner, ToolRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = ShellRunner::new();
//!     let output = runner.exec(&CommandSpec::new("flutter pub get").cwd("./todo")).await?;
//!     println!("Exit code: {}", output.exit_code);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod mock;
pub mod runner;
pub mod shell;

pub use command::{CommandSpec, ExecOutput, StreamLine, DEFAULT_TIMEOUT};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockToolRunner};
pub use runner::{drain_stream, LineStream, ToolRunner};
pub use shell::ShellRunner;
