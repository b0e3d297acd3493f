//! Resume command - continue the saved session's remaining steps.

use anyhow::Result;
use clap::Args;
use forge_core::NodeStatus;
use forge_kernel::Orchestrator;
use tracing::info;

use super::{interrupt_token, run::report, GlobalArgs};

#[derive(Args)]
pub struct ResumeArgs {
    /// Only restore and persist the session, run nothing
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(args: ResumeArgs, global: &GlobalArgs) -> Result<()> {
    let runtime = global.runtime()?;
    let mut orchestrator =
        Orchestrator::resume(runtime)?.ok_or_else(|| anyhow::anyhow!("No saved session in {}", global.root.display()))?;

    let graph = orchestrator.graph();
    let remaining = graph.count(NodeStatus::Pending) + graph.count(NodeStatus::Failed);
    info!(
        "Session {} restored (restart {}), {} of {} steps remaining",
        orchestrator.session().session_id,
        orchestrator.session().restart_count,
        remaining,
        graph.len()
    );

    if remaining == 0 {
        println!("Nothing left to do in session {}", orchestrator.session().session_id);
        return Ok(());
    }
    if args.dry_run {
        println!("{} step(s) would run", remaining);
        return Ok(());
    }

    let cancel = interrupt_token();
    let render = global.render(&orchestrator);
    let result = orchestrator.run_remaining(&cancel).await;
    render.finish().await;

    report(result?)
}
