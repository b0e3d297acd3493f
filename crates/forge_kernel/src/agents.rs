//! Fix agents competing in the arbitrator during fix mode.
//!
//! Each agent looks at the detected error records and may propose one
//! action. The arbitrator picks a single winner, and only the winner's
//! `apply` runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use forge_core::{AgentProposal, CancellationToken, ErrorRecord, ErrorType};
use forge_pipeline::RecoveryEngine;
use tracing::{info, warn};

use crate::actions::{PostStep, ProjectActions};
use crate::error::{KernelError, KernelResult};

/// What an agent may touch while applying its fix.
pub struct FixContext<'a> {
    pub actions: &'a ProjectActions,
    pub recovery: &'a RecoveryEngine,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait FixAgent: Send + Sync {
    fn name(&self) -> &'static str;

    /// A proposal for `records`, or `None` when this agent has nothing to offer.
    fn propose(&self, records: &[ErrorRecord]) -> Option<AgentProposal>;

    /// Carry out the proposed action. `Ok(true)` when the agent believes the
    /// errors are resolved.
    async fn apply(&self, records: &[ErrorRecord], ctx: &FixContext<'_>) -> KernelResult<bool>;
}

/// The agents consulted in fix mode, in submission order.
pub fn default_agents() -> Vec<Box<dyn FixAgent>> {
    vec![
        Box::new(FileRegenerator),
        Box::new(DependencyReinstaller),
        Box::new(ManualAgent),
    ]
}

/// Rewrites files named by auto-fixable records.
pub struct FileRegenerator;

impl FileRegenerator {
    fn targets(records: &[ErrorRecord]) -> BTreeMap<String, Vec<ErrorRecord>> {
        let mut targets: BTreeMap<String, Vec<ErrorRecord>> = BTreeMap::new();
        for record in records.iter().filter(|r| r.auto_fixable) {
            if let Some(file) = &record.file {
                targets.entry(file.clone()).or_default().push(record.clone());
            }
        }
        targets
    }
}

#[async_trait]
impl FixAgent for FileRegenerator {
    fn name(&self) -> &'static str {
        "file_regenerator"
    }

    fn propose(&self, records: &[ErrorRecord]) -> Option<AgentProposal> {
        let targets = Self::targets(records);
        if targets.is_empty() {
            return None;
        }
        let files: Vec<&str> = targets.keys().map(String::as_str).collect();
        Some(
            AgentProposal::new(self.name(), "regenerate_files")
                .scored(0.8, 0.2, 0.9)
                .with_steps(targets.len() as u32)
                .with_reasoning(format!("Rewrite {} with the errors in the prompt", files.join(", "))),
        )
    }

    async fn apply(&self, records: &[ErrorRecord], ctx: &FixContext<'_>) -> KernelResult<bool> {
        let generator = ctx.actions.generator();
        let fixer = generator.fixer(ctx.actions.plan().platform);
        let mut all_fixed = true;
        for (path, errors) in Self::targets(records) {
            if ctx.cancel.is_cancelled() {
                return Err(KernelError::Cancelled);
            }
            let fixed = ctx.recovery.repair_file(&fixer, &path, errors, ctx.cancel).await?;
            if !fixed {
                warn!("Could not repair {}", path);
                all_fixed = false;
            }
        }
        Ok(all_fixed)
    }
}

/// Re-runs the platform's install command for dependency errors.
pub struct DependencyReinstaller;

#[async_trait]
impl FixAgent for DependencyReinstaller {
    fn name(&self) -> &'static str {
        "dependency_reinstaller"
    }

    fn propose(&self, records: &[ErrorRecord]) -> Option<AgentProposal> {
        let missing: Vec<&str> = records
            .iter()
            .filter(|r| r.error_type == ErrorType::Dependency)
            .map(|r| r.message.as_str())
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(
            AgentProposal::new(self.name(), "reinstall_dependencies")
                .scored(0.7, 0.3, 0.7)
                .with_steps(1)
                .with_reasoning(format!("Reinstall dependencies: {}", missing.join("; "))),
        )
    }

    async fn apply(&self, _records: &[ErrorRecord], ctx: &FixContext<'_>) -> KernelResult<bool> {
        let Some(install) = ctx.actions.command_action(PostStep::Install) else {
            info!("Platform has no install command");
            return Ok(false);
        };
        let output = install.run(ctx.cancel).await.map_err(|e| {
            if e.is_cancelled() {
                KernelError::Cancelled
            } else {
                KernelError::FlowFailed {
                    node: PostStep::Install.node_id(),
                    message: e.message,
                }
            }
        })?;
        Ok(install.check(&output).is_empty())
    }
}

/// Always available: hand the problem to the user.
pub struct ManualAgent;

#[async_trait]
impl FixAgent for ManualAgent {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn propose(&self, records: &[ErrorRecord]) -> Option<AgentProposal> {
        if records.is_empty() {
            return None;
        }
        Some(
            AgentProposal::new(self.name(), "ask_user")
                .scored(0.35, 0.0, 0.2)
                .requiring_human()
                .with_reasoning("The errors need a person to look at them"),
        )
    }

    async fn apply(&self, _records: &[ErrorRecord], _ctx: &FixContext<'_>) -> KernelResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{Arbitrator, Severity};

    fn proposals(records: &[ErrorRecord]) -> Vec<AgentProposal> {
        default_agents().iter().filter_map(|a| a.propose(records)).collect()
    }

    #[test]
    fn test_syntax_errors_go_to_the_regenerator() {
        let records = vec![ErrorRecord::syntax("lib/main.dart", Some(10), "missing semicolon")];
        let decision = Arbitrator::new().arbitrate(proposals(&records), false);
        assert_eq!(decision.agent, "file_regenerator");
        assert!(!decision.requires_human_approval);
        assert_eq!(decision.rejected.len(), 1);
    }

    #[test]
    fn test_dependency_errors_go_to_the_reinstaller() {
        let records = vec![ErrorRecord::new(
            "Cannot find module 'react-dom'",
            ErrorType::Dependency,
            Severity::Error,
        )];
        let decision = Arbitrator::new().arbitrate(proposals(&records), false);
        assert_eq!(decision.agent, "dependency_reinstaller");
    }

    #[test]
    fn test_unknown_errors_need_a_human() {
        let records = vec![ErrorRecord::new("segfault", ErrorType::Runtime, Severity::Error)];
        let decision = Arbitrator::new().arbitrate(proposals(&records), false);
        assert_eq!(decision.agent, "manual");
        assert!(decision.requires_human_approval);
    }

    #[test]
    fn test_regenerator_groups_by_file() {
        let records = vec![
            ErrorRecord::syntax("a.js", Some(1), "x"),
            ErrorRecord::syntax("a.js", Some(4), "y"),
            ErrorRecord::syntax("b.js", None, "z"),
            ErrorRecord::new("no file", ErrorType::Build, Severity::Error),
        ];
        let targets = FileRegenerator::targets(&records);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets["a.js"].len(), 2);
    }
}
