//! Plan command - print a platform's file plan without generating.

use anyhow::{Context, Result};
use clap::Args;
use forge_core::Platform;
use forge_pipeline::GenerationPlan;

use super::{interrupt_token, GlobalArgs};

#[derive(Args)]
pub struct PlanArgs {
    /// Target platform (flutter, react, next, vue, angular, python, node, swift, kotlin, html)
    platform: String,

    /// Project name; also the directory checked for missing files
    name: String,

    /// Short description passed to the planner
    #[arg(short, long, default_value = "")]
    description: String,

    /// Feature to plan for (repeatable)
    #[arg(short, long = "feature")]
    features: Vec<String>,

    /// Model to prefer
    #[arg(short, long)]
    model: Option<String>,
}

pub async fn execute(args: PlanArgs, global: &GlobalArgs) -> Result<()> {
    let platform =
        Platform::from_str(&args.platform).ok_or_else(|| anyhow::anyhow!("Unknown platform: {}", args.platform))?;
    let runtime = global.runtime()?;
    let project_path = runtime.project_path(&args.name);
    let planner = runtime.planner(runtime.model_settings(args.model.as_deref()));

    let plan = planner
        .plan(
            platform,
            &args.name,
            &args.description,
            &args.features,
            &project_path,
            &interrupt_token(),
        )
        .await
        .context("Planning failed")?;

    if global.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_text(&plan);
    }
    Ok(())
}

fn print_text(plan: &GenerationPlan) {
    println!(
        "{} ({}) - {} files, source: {:?}",
        plan.project_name,
        plan.platform,
        plan.files.len(),
        plan.source
    );
    for file in &plan.files {
        let missing = plan.missing.iter().any(|m| m.path == file.path);
        println!(
            "  {:>3}  {:<40} {}{}",
            file.priority,
            file.path,
            file.description,
            if missing { "" } else { "  (exists)" }
        );
    }
}
