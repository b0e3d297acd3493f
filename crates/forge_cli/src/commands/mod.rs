//! CLI command definitions.
//!
//! Each subcommand maps to one orchestrator entry point. Settings are
//! layered: `.forge/config.toml`, then `FORGE_*` variables, then the
//! global flags below.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forge_core::{CancellationToken, ControlMode, EventScope, ForgeConfig, SecurityLevel, StoreBackend};
use forge_kernel::{Orchestrator, Runtime};
use tracing::{info, warn};

use crate::render::{RenderTask, Style};

pub mod clear;
pub mod plan;
pub mod resume;
pub mod run;
pub mod status;

/// AppForge - conversational app builder
#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "AppForge - describe an app, watch it being written")]
#[command(long_about = r#"
AppForge turns a conversational request into a generated project, streaming
every step (thoughts, plans, files typed character by character, terminal
output) as events.

COMMANDS:
  run      → Handle one turn ("create a flutter todo app", "fix it", "git status")
  resume   → Continue the saved session's remaining steps
  status   → Show the saved session
  clear    → Delete the saved session
  plan     → Print the file plan for a platform without writing anything

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Generation failure
  4 - Cancelled
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project root; generated projects and `.forge/` live here
    #[arg(long, global = true, env = "FORGE_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Print events as JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Also show internal and debug events
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pacing divisor for streamed code; 0 writes instantly
    #[arg(long, global = true)]
    pub typing_speed: Option<f64>,

    /// permissive, standard or strict
    #[arg(long, global = true)]
    pub security: Option<String>,

    /// json or sqlite
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Wait for approval before applying arbitrated fixes
    #[arg(long, global = true)]
    pub supervised: bool,
}

impl GlobalArgs {
    /// File and environment settings with these flags on top.
    pub fn config(&self) -> Result<ForgeConfig> {
        let mut config = ForgeConfig::load(&self.root)
            .with_context(|| format!("Failed to load config for {}", self.root.display()))?;
        if let Some(speed) = self.typing_speed {
            if speed.is_finite() && speed >= 0.0 {
                config.typing_speed = speed;
            } else {
                anyhow::bail!("Invalid option --typing-speed: {}", speed);
            }
        }
        if let Some(level) = &self.security {
            config.security_level = SecurityLevel::parse(level)
                .ok_or_else(|| anyhow::anyhow!("Invalid option --security: {}", level))?;
        }
        if let Some(store) = &self.store {
            config.store =
                StoreBackend::parse(store).ok_or_else(|| anyhow::anyhow!("Invalid option --store: {}", store))?;
        }
        if self.supervised {
            config.control_mode = ControlMode::Supervised;
        }
        Ok(config)
    }

    pub fn runtime(&self) -> Result<Runtime> {
        let config = self.config()?;
        Runtime::builder(config).build().context("Failed to start runtime")
    }

    pub fn style(&self) -> Style {
        if self.json {
            Style::Json
        } else {
            Style::Text
        }
    }

    pub fn scope(&self) -> EventScope {
        if self.verbose {
            EventScope::Debug
        } else {
            EventScope::Public
        }
    }

    /// Start printing events from `orchestrator`'s bus.
    pub fn render(&self, orchestrator: &Orchestrator) -> RenderTask {
        RenderTask::spawn(orchestrator.runtime().bus(), self.style(), self.scope())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle one conversational turn
    Run(run::RunArgs),

    /// Continue the saved session
    Resume(resume::ResumeArgs),

    /// Show the saved session
    Status(status::StatusArgs),

    /// Delete the saved session
    Clear(clear::ClearArgs),

    /// Print the file plan for a platform
    Plan(plan::PlanArgs),
}

/// A token cancelled by Ctrl-C.
pub fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, cancelling");
                on_signal.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn global(root: &std::path::Path, extra: &[&str]) -> GlobalArgs {
        let mut argv = vec!["forge", "--root", root.to_str().unwrap()];
        argv.extend_from_slice(extra);
        argv.push("status");
        Cli::parse_from(argv).global
    }

    #[test]
    fn test_flags_override_config() {
        let dir = TempDir::new().unwrap();
        let args = global(
            dir.path(),
            &["--typing-speed", "0", "--security", "strict", "--store", "sqlite", "--supervised"],
        );
        let config = args.config().unwrap();
        assert_eq!(config.typing_speed, 0.0);
        assert_eq!(config.security_level, SecurityLevel::Strict);
        assert_eq!(config.store, StoreBackend::Sqlite);
        assert_eq!(config.control_mode, ControlMode::Supervised);
        assert_eq!(config.project_root, dir.path());
    }

    #[test]
    fn test_invalid_security_level() {
        let dir = TempDir::new().unwrap();
        let args = global(dir.path(), &["--security", "paranoid"]);
        let err = args.config().unwrap_err();
        assert!(err.to_string().contains("--security"));
    }

    #[test]
    fn test_run_collects_the_whole_turn() {
        let cli = Cli::parse_from(["forge", "run", "create", "a", "flutter", "todo", "app"]);
        match cli.command {
            Commands::Run(args) => assert_eq!(args.turn(), "create a flutter todo app"),
            _ => panic!("expected run"),
        }
    }
}
