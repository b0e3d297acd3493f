//! Status command - show the saved session.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use forge_core::NodeStatus;
use forge_store::{open_store, PersistedState};
use serde_json::json;

use super::GlobalArgs;

#[derive(Args)]
pub struct StatusArgs {
    /// Number of recent events to list
    #[arg(long, default_value_t = 10)]
    events: usize,
}

pub async fn execute(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.config()?;
    let store = open_store(&config).context("Failed to open state store")?;
    let Some(state) = store.load().context("Failed to read saved session")? else {
        println!("No saved session");
        return Ok(());
    };

    if global.json {
        println!("{}", serde_json::to_string_pretty(&summary(&state, args.events))?);
    } else {
        print_text(&state, args.events);
    }
    Ok(())
}

fn summary(state: &PersistedState, events: usize) -> serde_json::Value {
    let recent = &state.events[state.events.len().saturating_sub(events)..];
    json!({
        "session": state.runtime,
        "flow": state.flow,
        "steps": state.graph.nodes,
        "last_snapshot": state.last_snapshot.as_ref().map(|s| json!({
            "id": s.id,
            "description": s.description,
            "timestamp": s.timestamp,
            "files": s.file_checksums.len(),
        })),
        "events": recent,
    })
}

fn print_text(state: &PersistedState, events: usize) {
    let runtime = &state.runtime;
    println!("Session:    {}", runtime.session_id);
    println!(
        "Started:    {}",
        runtime.started_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    println!("Restarts:   {}", runtime.restart_count);
    println!("Security:   {}", runtime.security_level);

    let flow = &state.flow;
    match (&flow.mode, &flow.project) {
        (Some(mode), project) if flow.active => {
            let project = project.as_deref().unwrap_or("-");
            println!("Flow:       {} on {} (active)", mode, project);
        }
        _ => println!("Flow:       idle"),
    }
    if let Some(step) = &flow.step {
        println!("Step:       {}/{} {}", step.index, step.total, step.label);
    }

    if !state.graph.nodes.is_empty() {
        println!();
        println!("Steps:");
        for node in &state.graph.nodes {
            let label = node.label.as_deref().unwrap_or(&node.id);
            println!("  {} {}", marker(node.status), label);
        }
    }

    if let Some(snapshot) = &state.last_snapshot {
        println!();
        println!("Last snapshot: {} ({} files)", snapshot.description, snapshot.file_checksums.len());
    }

    let recent = &state.events[state.events.len().saturating_sub(events)..];
    if !recent.is_empty() {
        println!();
        println!("Recent events:");
        for event in recent {
            println!("  #{} [{}] {}", event.seq, event.event_type, event.message);
        }
    }
}

fn marker(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Completed => "[x]",
        NodeStatus::Failed => "[!]",
        NodeStatus::Skipped => "[-]",
        NodeStatus::Running => "[>]",
        NodeStatus::Pending => "[ ]",
    }
}
