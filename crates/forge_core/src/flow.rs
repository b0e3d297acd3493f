//! Flow state: the single live record of the current flow.
//!
//! Invariant: when `active` is false, `mode`, `project` and `step` are all
//! `None`. There is no in-place mode switch; a flow must finish or be
//! aborted before another one starts.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CoreError, CoreResult};
use crate::intent::IntentMode;

/// Reference to the step a flow is currently on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRef {
    /// 1-based position.
    pub index: usize,
    pub total: usize,
    pub label: String,
}

impl StepRef {
    pub fn new(index: usize, total: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            total,
            label: label.into(),
        }
    }
}

/// Persistable flow record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FlowState {
    pub active: bool,
    pub mode: Option<IntentMode>,
    pub project: Option<String>,
    pub step: Option<StepRef>,
    pub todo: Vec<String>,
}

impl FlowState {
    /// Check the inactive-implies-empty invariant.
    pub fn is_consistent(&self) -> bool {
        self.active || (self.mode.is_none() && self.project.is_none() && self.step.is_none())
    }
}

/// How the last flow ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    Completed,
    Aborted { reason: String },
}

/// Owns and mutates the flow state. Only the orchestrator holds one.
#[derive(Debug, Default)]
pub struct FlowManager {
    state: FlowState,
    last_outcome: Option<FlowOutcome>,
}

impl FlowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted state. Inconsistent states are reset.
    pub fn from_state(state: FlowState) -> Self {
        let state = if state.is_consistent() {
            state
        } else {
            FlowState::default()
        };
        Self {
            state,
            last_outcome: None,
        }
    }

    pub fn start(&mut self, mode: IntentMode, project: Option<String>) -> CoreResult<()> {
        if let Some(current) = self.state.mode.filter(|_| self.state.active) {
            return Err(CoreError::FlowActive(current.to_string()));
        }
        info!(mode = %mode, project = ?project, "Flow started");
        self.state = FlowState {
            active: true,
            mode: Some(mode),
            project,
            step: None,
            todo: Vec::new(),
        };
        self.last_outcome = None;
        Ok(())
    }

    /// Move to a step. Ignored when no flow is active.
    pub fn next_step(&mut self, step: StepRef) {
        if !self.state.active {
            return;
        }
        debug!(index = step.index, total = step.total, label = %step.label, "Flow step");
        self.state.step = Some(step);
    }

    pub fn add_todo(&mut self, item: impl Into<String>) {
        let item = item.into();
        if self.state.active && !self.state.todo.contains(&item) {
            self.state.todo.push(item);
        }
    }

    /// Remove an item from the todo queue. Returns whether it was present.
    pub fn complete_todo(&mut self, item: &str) -> bool {
        let before = self.state.todo.len();
        self.state.todo.retain(|t| t != item);
        before != self.state.todo.len()
    }

    /// Reset every field. Idempotent.
    pub fn finish(&mut self) {
        if self.state.active {
            info!(mode = ?self.state.mode, "Flow finished");
            self.last_outcome = Some(FlowOutcome::Completed);
        }
        self.state = FlowState::default();
    }

    /// Reset after a cancellation or fatal error.
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.state.active {
            info!(reason = %reason, "Flow aborted");
            self.last_outcome = Some(FlowOutcome::Aborted { reason });
        }
        self.state = FlowState::default();
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn last_outcome(&self) -> Option<&FlowOutcome> {
        self.last_outcome.as_ref()
    }

    /// Replace the state wholesale (rollback). Inconsistent states are rejected.
    pub fn restore(&mut self, state: FlowState) -> bool {
        if !state.is_consistent() {
            return false;
        }
        self.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Platform;

    #[test]
    fn test_start_and_finish() {
        let mut flow = FlowManager::new();
        flow.start(IntentMode::Platform(Platform::Flutter), Some("todo".into()))
            .unwrap();
        assert!(flow.is_active());

        flow.next_step(StepRef::new(1, 3, "pubspec.yaml"));
        flow.add_todo("pubspec.yaml");
        flow.add_todo("lib/main.dart");
        assert!(flow.complete_todo("pubspec.yaml"));
        assert!(!flow.complete_todo("pubspec.yaml"));
        assert_eq!(flow.state().todo, vec!["lib/main.dart".to_string()]);

        flow.finish();
        assert!(!flow.is_active());
        assert_eq!(flow.state(), &FlowState::default());
        assert_eq!(flow.last_outcome(), Some(&FlowOutcome::Completed));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut once = FlowManager::new();
        once.start(IntentMode::Dialog, None).unwrap();
        once.finish();

        let mut twice = FlowManager::new();
        twice.start(IntentMode::Dialog, None).unwrap();
        twice.finish();
        twice.finish();

        assert_eq!(once.state(), twice.state());
        assert_eq!(once.last_outcome(), twice.last_outcome());
        assert!(!twice.is_active());
    }

    #[test]
    fn test_no_in_place_mode_switch() {
        let mut flow = FlowManager::new();
        flow.start(IntentMode::Git, None).unwrap();
        assert!(matches!(flow.start(IntentMode::Fix, None), Err(CoreError::FlowActive(_))));
    }

    #[test]
    fn test_abort_records_reason() {
        let mut flow = FlowManager::new();
        flow.start(IntentMode::Terminal, None).unwrap();
        flow.abort("cancelled");
        assert!(flow.state().is_consistent());
        assert_eq!(
            flow.last_outcome(),
            Some(&FlowOutcome::Aborted { reason: "cancelled".into() })
        );
    }

    #[test]
    fn test_restore_rejects_inconsistent_state() {
        let mut flow = FlowManager::new();
        let bad = FlowState {
            active: false,
            mode: Some(IntentMode::Fix),
            ..FlowState::default()
        };
        assert!(!flow.restore(bad));
    }
}
