//! Run command - handle one conversational turn.

use anyhow::{Context, Result};
use clap::Args;
use forge_kernel::{KernelError, Orchestrator, RunOutcome};
use tracing::info;

use super::{interrupt_token, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// What to do, e.g. "create a flutter todo app with login"
    #[arg(required = true, num_args = 1..)]
    words: Vec<String>,

    /// Model to prefer for this turn
    #[arg(short, long)]
    model: Option<String>,

    /// Start a new session instead of continuing the saved one
    #[arg(long)]
    new_session: bool,
}

impl RunArgs {
    pub fn turn(&self) -> String {
        self.words.join(" ")
    }
}

pub async fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    let runtime = global.runtime()?;
    let resumable = !args.new_session && runtime.store().load().context("Failed to read saved session")?.is_some();
    let mut orchestrator = if resumable {
        Orchestrator::resume(runtime)?.ok_or_else(|| anyhow::anyhow!("No saved session"))?
    } else {
        Orchestrator::new(runtime)
    };
    info!("Session {}", orchestrator.session().session_id);

    let cancel = interrupt_token();
    let render = global.render(&orchestrator);
    let result = orchestrator.run(&args.turn(), args.model.as_deref(), &cancel).await;
    render.finish().await;

    report(result?)
}

/// Print the outcome summary; a cancelled run is an error for the exit code.
pub(crate) fn report(outcome: RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Dialog { .. } => {}
        RunOutcome::Completed { project, files } => {
            println!();
            println!("Project '{}' ready ({} files)", project, files);
        }
        RunOutcome::Executed { command, exit_code } => {
            println!();
            println!("`{}` exited with {}", command, exit_code);
        }
        RunOutcome::Fixed { agent, attempts } => {
            println!();
            println!("Fixed by {} after {} attempt(s)", agent, attempts);
        }
        RunOutcome::AwaitingHuman { decision } => {
            println!();
            println!("Proposed fix needs approval: {} ({})", decision.agent, decision.action);
            println!("  {}", decision.reasoning);
        }
        RunOutcome::Cancelled => return Err(KernelError::Cancelled.into()),
    }
    Ok(())
}
