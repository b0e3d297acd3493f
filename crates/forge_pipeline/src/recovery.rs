//! Recovery engine.
//!
//! Owns the snapshot ring, turns detected errors into a [`RecoveryPlan`]
//! by severity and executes it against a [`RecoveryHost`] (the owner of the
//! flow and the action graph).
//!
//! | Severity | Strategy |
//! |---|---|
//! | info / warning | skip the step |
//! | error, auto-fixable | regenerate the affected file, bounded by `max_retries` |
//! | error | surface; skip when the node is non-critical, else stop |
//! | critical | restore the latest snapshot and re-run the node once |
//! | fatal | stop for manual action |

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use forge_core::{
    ActionError, CancellationToken, ErrorKind, ErrorRecord, ErrorType, Event, EventBus, EventType, FlowState,
    GraphMetadata, Severity, Snapshot, SnapshotRing,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::PipelineResult;

/// What recovery will do about a failed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RecoveryStrategy {
    SkipStep,
    /// Regenerate one file with an error-aware prompt, then re-run the node.
    RegenerateFile { path: String },
    /// Report only; `skip` continues the graph past the node.
    Surface { skip: bool },
    RollbackRetry { snapshot_id: String },
    Manual,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipStep => "skip_step",
            Self::RegenerateFile { .. } => "regenerate_file",
            Self::Surface { .. } => "surface",
            Self::RollbackRetry { .. } => "rollback_retry",
            Self::Manual => "manual",
        }
    }
}

/// A planned recovery for one failed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub node: String,
    pub strategy: RecoveryStrategy,
    pub severity: Severity,
    /// The most severe record; drives the strategy.
    pub primary: ErrorRecord,
    pub records: Vec<ErrorRecord>,
}

impl RecoveryPlan {
    /// True when executing the plan cannot bring the flow back.
    pub fn is_terminal(&self) -> bool {
        matches!(self.strategy, RecoveryStrategy::Manual | RecoveryStrategy::Surface { skip: false })
    }
}

/// Facts about the failed node that steer the plan.
#[derive(Debug, Clone, Default)]
pub struct RecoveryContext {
    pub critical: bool,
    /// File the node generates, if it is a file node.
    pub file: Option<String>,
}

/// The side that owns the flow and the graph.
#[async_trait]
pub trait RecoveryHost: Send {
    /// Rewrite `path` so that `errors` go away.
    async fn regenerate(&mut self, path: &str, errors: &[ErrorRecord]) -> bool;

    /// Mark the node skipped.
    fn skip(&mut self, node: &str) -> bool;

    /// Put flow and graph metadata back to the snapshot.
    fn restore(&mut self, snapshot: &Snapshot) -> bool;

    /// Return the node to pending so the next graph pass runs it again.
    fn retry(&mut self, node: &str) -> bool;
}

/// One fix attempt for a file: rewrite it and report what is still wrong.
#[async_trait]
pub trait FileFixer: Send + Sync {
    async fn fix_once(
        &self,
        path: &str,
        errors: &[ErrorRecord],
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<ErrorRecord>>;
}

/// Error records for a failed action. Actions that failed without detected
/// records get one synthesized from their error kind.
pub fn records_for(error: &ActionError) -> Vec<ErrorRecord> {
    if !error.records.is_empty() {
        return error.records.clone();
    }
    let error_type = match error.kind {
        ErrorKind::ValidateError => ErrorType::Syntax,
        ErrorKind::ToolError => ErrorType::Build,
        ErrorKind::TimeoutError => ErrorType::Timeout,
        ErrorKind::SecurityError => ErrorType::Permission,
        ErrorKind::ModelError | ErrorKind::StreamError | ErrorKind::WriteError => ErrorType::Runtime,
        _ => ErrorType::Unknown,
    };
    vec![ErrorRecord::new(error.message.clone(), error_type, error.kind.default_severity())]
}

/// Classifies errors, plans and executes recoveries, and keeps snapshots.
pub struct RecoveryEngine {
    bus: EventBus,
    max_retries: u32,
    ring: Mutex<SnapshotRing>,
    /// Fix attempts per file.
    attempts: Mutex<HashMap<String, u32>>,
    /// Nodes that already used their rollback-retry.
    rolled_back: Mutex<HashSet<String>>,
}

impl RecoveryEngine {
    pub fn new(bus: EventBus, snapshot_capacity: usize, max_retries: u32) -> Self {
        Self {
            bus,
            max_retries,
            ring: Mutex::new(SnapshotRing::new(snapshot_capacity)),
            attempts: Mutex::new(HashMap::new()),
            rolled_back: Mutex::new(HashSet::new()),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record a snapshot and return its id.
    pub fn snapshot(
        &self,
        description: impl Into<String>,
        flow: &FlowState,
        graph: GraphMetadata,
        checksums: BTreeMap<String, String>,
    ) -> String {
        let snapshot = Snapshot::new(description, flow.clone(), graph).with_checksums(checksums);
        let description = snapshot.description.clone();
        let id = self.ring.lock().push(snapshot);
        debug!("Snapshot {} taken: {}", id, description);
        self.bus.emit(
            Event::new(EventType::ThoughtInternal, format!("Snapshot: {}", description))
                .debug()
                .with_data(json!({ "snapshot_id": id })),
        );
        id
    }

    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.ring.lock().latest().cloned()
    }

    pub fn get_snapshot(&self, id: &str) -> Option<Snapshot> {
        self.ring.lock().get(id).cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.ring.lock().len()
    }

    /// Effective severity of a record.
    pub fn classify(&self, error: &ErrorRecord) -> Severity {
        match error.error_type {
            ErrorType::Permission => Severity::Fatal,
            ErrorType::Timeout => error.severity.max(Severity::Critical),
            _ => error.severity,
        }
    }

    pub fn attempts_for(&self, path: &str) -> u32 {
        self.attempts.lock().get(path).copied().unwrap_or(0)
    }

    /// Forget attempt counters and used rollbacks (new flow).
    pub fn reset(&self) {
        self.attempts.lock().clear();
        self.rolled_back.lock().clear();
    }

    /// Emit `error_detected` for every record, plus `syntax_error_detected`
    /// for syntax records. Raw output goes to the debug scope only.
    pub fn report(&self, records: &[ErrorRecord]) {
        for record in records {
            let severity = self.classify(record);
            self.bus.emit(
                Event::new(EventType::ErrorDetected, record.public_message())
                    .with_data(record.to_event_data())
                    .with("severity", json!(severity)),
            );
            if record.error_type == ErrorType::Syntax {
                self.bus.emit(
                    Event::new(EventType::SyntaxErrorDetected, record.public_message()).with_data(record.to_event_data()),
                );
            }
            if record.raw != record.message {
                self.bus.emit(
                    Event::new(EventType::ErrorDetected, record.raw.clone())
                        .debug()
                        .with("file", json!(record.file)),
                );
            }
        }
    }

    /// Choose a strategy for `node` from its error records.
    pub fn plan(&self, node: &str, records: &[ErrorRecord], ctx: &RecoveryContext) -> RecoveryPlan {
        let primary = records
            .iter()
            .fold(None::<&ErrorRecord>, |best, r| match best {
                Some(b) if self.classify(b) >= self.classify(r) => Some(b),
                _ => Some(r),
            })
            .cloned()
            .unwrap_or_else(|| ErrorRecord::new(format!("{} failed", node), ErrorType::Unknown, Severity::Error));
        let severity = self.classify(&primary);

        let strategy = match severity {
            Severity::Info | Severity::Warning => RecoveryStrategy::SkipStep,
            Severity::Error => match self.fix_target(records, ctx) {
                Some(path) => RecoveryStrategy::RegenerateFile { path },
                None => RecoveryStrategy::Surface { skip: !ctx.critical },
            },
            Severity::Critical => match self.latest_snapshot() {
                Some(snapshot) if !self.rolled_back.lock().contains(node) => RecoveryStrategy::RollbackRetry {
                    snapshot_id: snapshot.id,
                },
                _ => RecoveryStrategy::Manual,
            },
            Severity::Fatal => RecoveryStrategy::Manual,
        };

        info!("Recovery for {}: {} ({})", node, strategy.as_str(), severity);
        RecoveryPlan {
            node: node.to_string(),
            strategy,
            severity,
            primary,
            records: records.to_vec(),
        }
    }

    /// First auto-fixable file with attempts left.
    fn fix_target(&self, records: &[ErrorRecord], ctx: &RecoveryContext) -> Option<String> {
        records
            .iter()
            .filter(|r| r.auto_fixable && self.classify(r) == Severity::Error)
            .filter_map(|r| r.file.clone().or_else(|| ctx.file.clone()))
            .find(|path| self.attempts_for(path) < self.max_retries)
    }

    fn next_attempt(&self, path: &str) -> u32 {
        let mut attempts = self.attempts.lock();
        let counter = attempts.entry(path.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Carry out `plan`. Returns true when the graph can continue.
    pub async fn execute(&self, plan: &RecoveryPlan, host: &mut dyn RecoveryHost) -> bool {
        match &plan.strategy {
            RecoveryStrategy::SkipStep => host.skip(&plan.node),
            RecoveryStrategy::RegenerateFile { path } => {
                let attempt = self.next_attempt(path);
                self.fix_started(path, attempt);
                let errors: Vec<ErrorRecord> = plan
                    .records
                    .iter()
                    .filter(|r| r.file.as_deref().map_or(true, |f| f == path))
                    .cloned()
                    .collect();
                if !host.regenerate(path, &errors).await {
                    warn!("Regenerating {} failed (attempt {})", path, attempt);
                    return false;
                }
                self.fixed(path, attempt);
                host.retry(&plan.node)
            }
            RecoveryStrategy::Surface { skip: true } => host.skip(&plan.node),
            RecoveryStrategy::Surface { skip: false } | RecoveryStrategy::Manual => false,
            RecoveryStrategy::RollbackRetry { snapshot_id } => {
                self.rolled_back.lock().insert(plan.node.clone());
                self.rollback(snapshot_id, host) && host.retry(&plan.node)
            }
        }
    }

    /// Restore the snapshot through `host`.
    pub fn rollback(&self, snapshot_id: &str, host: &mut dyn RecoveryHost) -> bool {
        let Some(snapshot) = self.get_snapshot(snapshot_id) else {
            warn!("Unknown snapshot {}", snapshot_id);
            return false;
        };
        info!("Rolling back to snapshot {} ({})", snapshot.id, snapshot.description);
        self.bus.emit(
            Event::new(EventType::Decision, format!("Rolling back to: {}", snapshot.description))
                .internal()
                .with_data(json!({ "snapshot_id": snapshot.id })),
        );
        host.restore(&snapshot)
    }

    /// Fix-file mode: rewrite `path` until it validates, at most
    /// `max_retries` attempts in total for that file.
    pub async fn repair_file(
        &self,
        fixer: &dyn FileFixer,
        path: &str,
        records: Vec<ErrorRecord>,
        cancel: &CancellationToken,
    ) -> PipelineResult<bool> {
        let mut remaining = records;
        while self.attempts_for(path) < self.max_retries {
            let attempt = self.next_attempt(path);
            self.fix_started(path, attempt);
            remaining = fixer.fix_once(path, &remaining, cancel).await?;
            if remaining.is_empty() {
                self.fixed(path, attempt);
                return Ok(true);
            }
            self.report(&remaining);
        }
        warn!("Giving up on {} after {} attempts", path, self.max_retries);
        Ok(false)
    }

    fn fix_started(&self, path: &str, attempt: u32) {
        self.bus.emit(
            Event::new(EventType::ErrorFixStarted, format!("Fixing {}", path)).with_data(json!({
                "path": path,
                "attempt": attempt,
                "max_attempts": self.max_retries,
            })),
        );
    }

    fn fixed(&self, path: &str, attempt: u32) {
        self.bus.emit(
            Event::new(EventType::ErrorFixed, format!("Fixed {}", path))
                .with_data(json!({ "path": path, "attempts": attempt })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{ActionGraph, ActionNode, FnAction, NodeStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> (EventBus, RecoveryEngine) {
        let bus = EventBus::new();
        let engine = RecoveryEngine::new(bus.clone(), 50, 3);
        (bus, engine)
    }

    fn ctx(critical: bool) -> RecoveryContext {
        RecoveryContext { critical, file: None }
    }

    struct GraphHost {
        graph: ActionGraph,
        regenerated: Vec<String>,
        restored: Option<String>,
    }

    #[async_trait]
    impl RecoveryHost for GraphHost {
        async fn regenerate(&mut self, path: &str, _errors: &[ErrorRecord]) -> bool {
            self.regenerated.push(path.to_string());
            true
        }

        fn skip(&mut self, node: &str) -> bool {
            self.graph.skip(node).is_ok()
        }

        fn restore(&mut self, snapshot: &Snapshot) -> bool {
            self.graph.restore_metadata(&snapshot.graph_metadata);
            self.restored = Some(snapshot.id.clone());
            true
        }

        fn retry(&mut self, node: &str) -> bool {
            self.graph.reset(node).is_ok()
        }
    }

    async fn failed_graph() -> GraphHost {
        let mut graph = ActionGraph::new();
        graph
            .add(ActionNode::new("build", FnAction::fail(ErrorKind::ToolError, "build failed")))
            .unwrap();
        graph.execute_all(false).await.unwrap();
        GraphHost {
            graph,
            regenerated: Vec::new(),
            restored: None,
        }
    }

    #[test]
    fn test_strategy_by_severity() {
        let (_bus, engine) = engine();
        let warning = ErrorRecord::new("unused import", ErrorType::Build, Severity::Warning);
        assert_eq!(engine.plan("n", &[warning], &ctx(true)).strategy, RecoveryStrategy::SkipStep);

        let fixable = ErrorRecord::syntax("lib/main.dart", Some(10), "missing semicolon");
        assert_eq!(
            engine.plan("n", &[fixable], &ctx(true)).strategy,
            RecoveryStrategy::RegenerateFile { path: "lib/main.dart".into() }
        );

        let build = ErrorRecord::new("linker failed", ErrorType::Build, Severity::Error);
        assert_eq!(engine.plan("n", &[build.clone()], &ctx(false)).strategy, RecoveryStrategy::Surface { skip: true });
        let plan = engine.plan("n", &[build], &ctx(true));
        assert_eq!(plan.strategy, RecoveryStrategy::Surface { skip: false });
        assert!(plan.is_terminal());

        let fatal = ErrorRecord::new("Permission denied", ErrorType::Permission, Severity::Error);
        assert_eq!(engine.plan("n", &[fatal], &ctx(false)).strategy, RecoveryStrategy::Manual);
    }

    #[test]
    fn test_most_severe_record_wins() {
        let (_bus, engine) = engine();
        let records = vec![
            ErrorRecord::new("deprecated", ErrorType::Build, Severity::Warning),
            ErrorRecord::new("no space left on device", ErrorType::Runtime, Severity::Fatal),
        ];
        let plan = engine.plan("n", &records, &ctx(false));
        assert_eq!(plan.severity, Severity::Fatal);
        assert_eq!(plan.primary.message, "no space left on device");
    }

    #[test]
    fn test_critical_without_snapshot_is_manual() {
        let (_bus, engine) = engine();
        let timeout = ErrorRecord::new("Build timed out", ErrorType::Timeout, Severity::Error);
        assert_eq!(engine.classify(&timeout), Severity::Critical);
        assert_eq!(engine.plan("n", &[timeout], &ctx(true)).strategy, RecoveryStrategy::Manual);
    }

    #[tokio::test]
    async fn test_rollback_retry_only_once_per_node() {
        let (_bus, engine) = engine();
        let mut host = failed_graph().await;
        let id = engine.snapshot("before build", &FlowState::default(), GraphMetadata::default(), BTreeMap::new());

        let timeout = ErrorRecord::new("timed out", ErrorType::Timeout, Severity::Critical);
        let plan = engine.plan("build", &[timeout.clone()], &ctx(true));
        assert_eq!(plan.strategy, RecoveryStrategy::RollbackRetry { snapshot_id: id.clone() });
        assert!(engine.execute(&plan, &mut host).await);
        assert_eq!(host.restored.as_deref(), Some(id.as_str()));
        assert_eq!(host.graph.get("build").unwrap().status(), NodeStatus::Pending);

        let again = engine.plan("build", &[timeout], &ctx(true));
        assert_eq!(again.strategy, RecoveryStrategy::Manual);
    }

    #[tokio::test]
    async fn test_regenerate_emits_fix_events_and_retries_node() {
        let (bus, engine) = engine();
        let mut host = failed_graph().await;
        let record = ErrorRecord::syntax("lib/main.dart", Some(10), "missing semicolon");
        let plan = engine.plan("build", &[record], &ctx(true));

        assert!(engine.execute(&plan, &mut host).await);
        assert_eq!(host.regenerated, vec!["lib/main.dart"]);
        assert_eq!(host.graph.get("build").unwrap().status(), NodeStatus::Pending);
        assert_eq!(bus.events_of(EventType::ErrorFixStarted).len(), 1);
        assert_eq!(bus.events_of(EventType::ErrorFixed).len(), 1);
        assert_eq!(engine.attempts_for("lib/main.dart"), 1);
    }

    #[tokio::test]
    async fn test_skip_step_on_warning() {
        let (_bus, engine) = engine();
        let mut host = failed_graph().await;
        let warning = ErrorRecord::new("slow", ErrorType::Build, Severity::Warning);
        let plan = engine.plan("build", &[warning], &ctx(true));
        assert!(engine.execute(&plan, &mut host).await);
        assert_eq!(host.graph.get("build").unwrap().status(), NodeStatus::Skipped);
    }

    struct CountingFixer {
        calls: AtomicUsize,
        succeed_on: usize,
    }

    #[async_trait]
    impl FileFixer for CountingFixer {
        async fn fix_once(
            &self,
            path: &str,
            _errors: &[ErrorRecord],
            _cancel: &CancellationToken,
        ) -> PipelineResult<Vec<ErrorRecord>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(Vec::new())
            } else {
                Ok(vec![ErrorRecord::syntax(path, Some(1), "still broken")])
            }
        }
    }

    #[tokio::test]
    async fn test_repair_file_bounded_by_max_retries() {
        let (bus, engine) = engine();
        let never = CountingFixer {
            calls: AtomicUsize::new(0),
            succeed_on: usize::MAX,
        };
        let record = ErrorRecord::syntax("a.py", Some(1), "broken");
        let fixed = engine
            .repair_file(&never, "a.py", vec![record.clone()], &CancellationToken::new())
            .await
            .unwrap();
        assert!(!fixed);
        assert_eq!(never.calls.load(Ordering::SeqCst), 3);
        assert!(bus.events_of(EventType::ErrorFixed).is_empty());

        let second_try = CountingFixer {
            calls: AtomicUsize::new(0),
            succeed_on: 2,
        };
        let fixed = engine
            .repair_file(&second_try, "b.py", vec![record], &CancellationToken::new())
            .await
            .unwrap();
        assert!(fixed);
        assert_eq!(engine.attempts_for("b.py"), 2);
        assert_eq!(bus.events_of(EventType::ErrorFixed).len(), 1);
    }

    #[test]
    fn test_records_for_synthesizes_from_kind() {
        let records = records_for(&ActionError::new(ErrorKind::TimeoutError, "model call timed out"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error_type, ErrorType::Timeout);
        assert_eq!(records[0].severity, Severity::Critical);
    }
}
