//! The orchestrator kernel: the single public entry point of a session.
//!
//! `run(turn)` classifies the turn and dispatches it:
//!
//! - `dialog`: stream a reply as `thought` events, then `done`
//! - `platform`: start the flow, plan, build the action graph (one node per
//!   file, then the post steps) and execute it with recovery
//! - `fix`: build, detect errors, arbitrate between fix agents, apply the winner
//! - `git` / `terminal`: run a command through the tool runner under the
//!   security policy
//! - `continue`: re-run whatever is left of the current graph
//!
//! State is persisted after every completed node and at the end of a turn.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use forge_core::{
    user_message, ActionGraph, Arbitrator, ArbitrationDecision, CancellationToken, ControlMode, ErrorKind, ErrorRecord,
    Event, EventType, FlowManager, FlowState, GraphMetadata, GraphObserver, GraphOutcome, IntentEngine, IntentMode,
    NodeStatus, Platform, RuntimeConfig, Snapshot, StepRef,
};
use forge_pipeline::{
    records_for, FileWriter, GenerationPlan, LiveGenerator, ModelSettings, RecoveryContext, RecoveryEngine, RecoveryHost,
};
use forge_store::PersistedState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::actions::{file_of, CommandAction, PostStep, ProjectActions};
use crate::agents::{default_agents, FixAgent, FixContext};
use crate::dialog::DialogSkill;
use crate::error::{KernelError, KernelResult};
use crate::runtime::Runtime;
use crate::security::CommandPolicy;

/// Words stripped from the front of a terminal turn.
const TERMINAL_PREFIXES: &[&str] = &["please", "run", "execute", "terminal", "shell", "command", "the", "in", ":"];

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Dialog { reply: String },
    Completed { project: String, files: usize },
    Executed { command: String, exit_code: i32 },
    Fixed { agent: String, attempts: u32 },
    /// The arbitrated fix needs a person before it may run.
    AwaitingHuman { decision: ArbitrationDecision },
    Cancelled,
}

/// What a resumed session needs besides flow and graph metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionContext {
    plan: GenerationPlan,
    project_path: PathBuf,
    #[serde(default)]
    model: Option<String>,
}

pub struct Orchestrator {
    runtime: Runtime,
    session: RuntimeConfig,
    intent: IntentEngine,
    flow: FlowManager,
    graph: ActionGraph,
    actions: Option<ProjectActions>,
    model: Option<String>,
    arbitrator: Arbitrator,
    agents: Vec<Box<dyn FixAgent>>,
    policy: CommandPolicy,
}

impl Orchestrator {
    /// A fresh session.
    pub fn new(runtime: Runtime) -> Self {
        let session = RuntimeConfig::new(runtime.config());
        Self::with_session(runtime, session)
    }

    fn with_session(runtime: Runtime, session: RuntimeConfig) -> Self {
        let policy = CommandPolicy::new(session.security_level);
        Self {
            runtime,
            session,
            intent: IntentEngine::new(),
            flow: FlowManager::new(),
            graph: ActionGraph::new(),
            actions: None,
            model: None,
            arbitrator: Arbitrator::new(),
            agents: default_agents(),
            policy,
        }
    }

    /// Rebuild the last persisted session, or `None` when the store is empty.
    ///
    /// The graph is re-bound through a fresh action registry; nodes that were
    /// running when the state was written come back pending.
    pub fn resume(runtime: Runtime) -> KernelResult<Option<Self>> {
        let Some(state) = runtime.store().load()? else {
            return Ok(None);
        };
        let session = state.runtime.clone().restarted();
        info!(
            "Resuming session {} (restart {})",
            session.session_id, session.restart_count
        );

        let mut orchestrator = Self::with_session(runtime, session);
        orchestrator.runtime.bus().restore_history(state.events);
        orchestrator.flow = FlowManager::from_state(state.flow);

        if !state.context.is_null() {
            let context: SessionContext =
                serde_json::from_value(state.context).map_err(|e| KernelError::Context(e.to_string()))?;
            let settings = orchestrator.runtime.model_settings(context.model.as_deref());
            let actions = orchestrator.bind(context.plan, context.project_path, settings);
            orchestrator.graph = ActionGraph::from_metadata(&state.graph, &actions.registry())?;
            orchestrator.model = context.model;
            orchestrator.actions = Some(actions);
        }

        if let Some(snapshot) = state.last_snapshot {
            orchestrator.runtime.recovery().snapshot(
                snapshot.description,
                &snapshot.flow_state,
                snapshot.graph_metadata,
                snapshot.file_checksums,
            );
        }
        orchestrator.persist();
        Ok(Some(orchestrator))
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn session(&self) -> &RuntimeConfig {
        &self.session
    }

    pub fn flow(&self) -> &FlowState {
        self.flow.state()
    }

    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    pub fn plan(&self) -> Option<&GenerationPlan> {
        self.actions.as_ref().map(|a| a.plan().as_ref())
    }

    /// Handle one user turn.
    pub async fn run(
        &mut self,
        turn: &str,
        model_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> KernelResult<RunOutcome> {
        let intent = self.intent.classify(turn, self.flow.is_active());
        info!("Turn classified as {}", intent.mode);
        self.runtime.bus().emit(
            Event::new(EventType::ThoughtInternal, format!("Intent: {}", intent.mode))
                .internal()
                .with_data(json!({ "intent": intent })),
        );

        let result = match intent.mode {
            IntentMode::Dialog => self.dialog(turn, model_hint, cancel).await,
            IntentMode::Platform(platform) => self.generate(platform, intent.project, turn, model_hint, cancel).await,
            IntentMode::Fix => self.fix(cancel).await,
            IntentMode::Git => self.git(turn, cancel).await,
            IntentMode::Terminal => self.terminal(turn, cancel).await,
            IntentMode::Continue => self.continue_flow(cancel).await,
        };

        self.settle(result)
    }

    /// Execute what is left of the current graph without a turn.
    pub async fn run_remaining(&mut self, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let result = self.continue_flow(cancel).await;
        self.settle(result)
    }

    /// Turn a cancellation into the cancelled outcome and report failures.
    fn settle(&mut self, result: KernelResult<RunOutcome>) -> KernelResult<RunOutcome> {
        match result {
            Err(e) if e.is_cancelled() => {
                self.cancelled();
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
            ok => ok,
        }
    }

    async fn continue_flow(&mut self, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let plan = Arc::clone(self.actions.as_ref().ok_or(KernelError::NoProject)?.plan());
        if !self.flow.is_active() {
            self.flow
                .start(IntentMode::Platform(plan.platform), Some(plan.project_name.clone()))?;
        }
        let failed: Vec<String> = self
            .graph
            .nodes()
            .filter(|n| n.status() == NodeStatus::Failed)
            .map(|n| n.id().to_string())
            .collect();
        for id in &failed {
            self.graph.reset(id)?;
        }
        let remaining = self.graph.len() - self.graph.count(NodeStatus::Completed) - self.graph.count(NodeStatus::Skipped);
        self.runtime.bus().emit(
            Event::new(EventType::Analysis, format!("Continuing {}", plan.project_name))
                .with_data(json!({ "project": plan.project_name, "remaining": remaining })),
        );
        self.execute(cancel).await
    }

    async fn dialog(
        &mut self,
        turn: &str,
        model_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> KernelResult<RunOutcome> {
        let settings = self.runtime.model_settings(model_hint);
        let reply = DialogSkill::new(self.runtime.router(), self.runtime.bus(), settings)
            .respond(turn, cancel)
            .await?;
        self.runtime
            .bus()
            .emit(Event::new(EventType::Done, "Reply complete").with("mode", "dialog"));
        Ok(RunOutcome::Dialog { reply })
    }

    async fn generate(
        &mut self,
        platform: Platform,
        project: Option<String>,
        turn: &str,
        model_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> KernelResult<RunOutcome> {
        let project = project.unwrap_or_else(|| format!("{}_app", platform));
        self.flow.start(IntentMode::Platform(platform), Some(project.clone()))?;
        self.runtime.recovery().reset();

        let features = parse_features(turn);
        let project_path = self.runtime.project_path(&project);
        self.runtime.bus().emit(
            Event::new(EventType::Analysis, format!("Building a {} app: {}", platform, project)).with_data(json!({
                "platform": platform,
                "project": project,
                "features": features,
                "path": project_path.display().to_string(),
            })),
        );

        self.graph = ActionGraph::new();
        self.runtime.recovery().snapshot(
            "before generation",
            self.flow.state(),
            self.graph.metadata(),
            BTreeMap::new(),
        );

        let settings = self.runtime.model_settings(model_hint);
        let plan = self
            .runtime
            .planner(settings.clone())
            .plan(platform, &project, turn, &features, &project_path, cancel)
            .await?;

        self.model = settings.model.clone();
        let actions = self.bind(plan, project_path, settings);
        self.graph = actions.build_graph()?;
        let labels: Vec<String> = self.graph.nodes().map(|n| n.label().to_string()).collect();
        for label in &labels {
            self.flow.add_todo(label.clone());
        }
        self.runtime.bus().emit(
            Event::new(EventType::Todo, format!("{} steps planned", labels.len()))
                .with_data(json!({ "items": labels })),
        );
        self.actions = Some(actions);
        self.persist();

        self.execute(cancel).await
    }

    /// Bind the actions of a project with the runtime's services.
    fn bind(&self, plan: GenerationPlan, project_path: PathBuf, settings: ModelSettings) -> ProjectActions {
        let config = self.runtime.config();
        let generator = self.runtime.generator(&project_path, settings);
        let commands = self.runtime.templates().commands(plan.platform);
        let commit = self.runtime.templates().commit_command(&plan.project_name);
        ProjectActions::new(
            generator,
            Arc::new(plan),
            self.runtime.runner(),
            self.runtime.bus().clone(),
            commands,
            commit,
            config.post_steps.clone(),
            config.tool_timeout(),
        )
    }

    /// Drive the graph to completion, consulting recovery on each failure.
    async fn execute(&mut self, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let actions = self.actions.clone().ok_or(KernelError::NoProject)?;
        let recovery = Arc::clone(self.runtime.recovery());
        let context = self.context();
        let platform = actions.plan().platform;

        loop {
            self.graph.set_cancel(cancel.clone());
            let outcome = {
                let mut observer = KernelObserver {
                    flow: &mut self.flow,
                    checkpoint: Checkpoint {
                        runtime: &self.runtime,
                        session: &self.session,
                        context: &context,
                    },
                    writer: actions.generator().writer(),
                };
                self.graph.execute_all_observed(false, &mut observer).await?
            };

            let (node, error) = match outcome {
                GraphOutcome::Completed => return Ok(self.completed(&actions)),
                GraphOutcome::Cancelled => return Err(KernelError::Cancelled),
                GraphOutcome::Failed { node, error } => (node, error),
            };

            let records = records_for(&error);
            let file = file_of(&node).map(str::to_string);
            // The generator already reported validation failures of its own file.
            if !(file.is_some() && error.kind == ErrorKind::ValidateError) {
                recovery.report(&records);
            }
            let ctx = RecoveryContext {
                critical: self.graph.get(&node).map_or(true, |n| n.is_critical()),
                file,
            };
            let plan = recovery.plan(&node, &records, &ctx);
            self.runtime.bus().emit(
                Event::new(EventType::ThoughtInternal, format!("Recovering {}: {}", node, plan.strategy.as_str()))
                    .internal()
                    .with_data(json!({ "node": node, "strategy": plan.strategy, "severity": plan.severity })),
            );

            let recovered = {
                let mut host = KernelHost {
                    graph: &mut self.graph,
                    flow: &mut self.flow,
                    generator: actions.generator(),
                    recovery: &recovery,
                    platform,
                    cancel,
                };
                recovery.execute(&plan, &mut host).await
            };
            if cancel.is_cancelled() {
                return Err(KernelError::Cancelled);
            }
            if !recovered {
                return Err(KernelError::FlowFailed {
                    node,
                    message: plan.primary.public_message(),
                });
            }
            debug!("Recovery of {} succeeded, resuming graph", node);
        }
    }

    fn completed(&mut self, actions: &ProjectActions) -> RunOutcome {
        let plan = actions.plan();
        let writer = actions.generator().writer();
        self.runtime.recovery().snapshot(
            "generation complete",
            self.flow.state(),
            self.graph.metadata(),
            writer.checksums(),
        );
        self.flow.finish();
        let files = plan.files.len();
        info!("Project {} complete ({} files)", plan.project_name, files);
        self.runtime.bus().emit(
            Event::new(EventType::Done, format!("{} is ready", plan.project_name)).with_data(json!({
                "mode": "platform",
                "project": plan.project_name,
                "files": files,
                "path": writer.root().display().to_string(),
                "skipped": self.graph.count(NodeStatus::Skipped),
            })),
        );
        self.persist();
        RunOutcome::Completed {
            project: plan.project_name.clone(),
            files,
        }
    }

    /// Fix mode: build, and while it fails let the arbitrated agent act.
    async fn fix(&mut self, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let actions = self.actions.clone().ok_or(KernelError::NoProject)?;
        let plan = Arc::clone(actions.plan());
        let build = actions
            .command_action(PostStep::Build)
            .ok_or_else(|| KernelError::EmptyCommand(format!("{} build", plan.platform)))?;
        self.flow.start(IntentMode::Fix, Some(plan.project_name.clone()))?;
        self.runtime.recovery().reset();

        let max_attempts = self.runtime.config().max_retries;
        let mut winner: Option<String> = None;
        for attempt in 0..=max_attempts {
            let output = build.run(cancel).await.map_err(|e| action_failed("fix", e))?;
            let records = build.check(&output);
            if records.is_empty() {
                self.flow.finish();
                let agent = winner.unwrap_or_else(|| "none".to_string());
                self.runtime.bus().emit(
                    Event::new(EventType::Done, "Build passes").with_data(json!({
                        "mode": "fix",
                        "agent": agent,
                        "attempts": attempt,
                    })),
                );
                self.persist();
                return Ok(RunOutcome::Fixed { agent, attempts: attempt });
            }
            if attempt == max_attempts {
                break;
            }

            self.runtime.recovery().report(&records);
            let proposals = self.agents.iter().filter_map(|a| a.propose(&records)).collect();
            let decision = self.arbitrator.arbitrate(proposals, false);
            self.runtime.bus().emit(
                Event::new(EventType::Decision, format!("{}: {}", decision.agent, decision.action))
                    .with_data(serde_json::to_value(&decision).unwrap_or_default()),
            );

            if decision.requires_human_approval || self.session.control_mode == ControlMode::Supervised {
                info!("Fix by {} is waiting for approval", decision.agent);
                self.flow.finish();
                self.runtime.bus().emit(
                    Event::new(EventType::Done, "Waiting for approval").with_data(json!({
                        "mode": "fix",
                        "awaiting_human": true,
                        "agent": decision.agent,
                    })),
                );
                self.persist();
                return Ok(RunOutcome::AwaitingHuman { decision });
            }

            let Some(agent) = self.agents.iter().find(|a| a.name() == decision.agent) else {
                return Err(KernelError::FlowFailed {
                    node: "fix".into(),
                    message: format!("no agent named {}", decision.agent),
                });
            };
            let ctx = FixContext {
                actions: &actions,
                recovery: self.runtime.recovery(),
                cancel,
            };
            if !agent.apply(&records, &ctx).await? {
                return Err(KernelError::FlowFailed {
                    node: "fix".into(),
                    message: first_message(&records),
                });
            }
            winner = Some(decision.agent);
        }

        Err(KernelError::FlowFailed {
            node: PostStep::Build.node_id(),
            message: format!("build still failing after {} fix attempts", max_attempts),
        })
    }

    async fn git(&mut self, turn: &str, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let lower = turn.to_lowercase();
        let command = if lower.contains("commit") {
            let project = self.plan().map(|p| p.project_name.clone()).unwrap_or_else(|| "project".into());
            self.runtime.templates().commit_command(&project)
        } else if lower.contains("log") || lower.contains("history") {
            "git log --oneline -n 10".to_string()
        } else {
            "git status --short".to_string()
        };
        self.run_command(IntentMode::Git, command, Some(EventType::Git), cancel).await
    }

    async fn terminal(&mut self, turn: &str, cancel: &CancellationToken) -> KernelResult<RunOutcome> {
        let mut command = extract_command(turn);
        if command.split_whitespace().next() == Some("install") {
            if let Some(install) = self.actions.as_ref().and_then(|a| a.command_for(PostStep::Install)) {
                command = install;
            }
        }
        self.run_command(IntentMode::Terminal, command, None, cancel).await
    }

    async fn run_command(
        &mut self,
        mode: IntentMode,
        command: String,
        announce: Option<EventType>,
        cancel: &CancellationToken,
    ) -> KernelResult<RunOutcome> {
        self.policy.check(&command)?;
        let project = self.plan().map(|p| p.project_name.clone());
        let cwd = self
            .actions
            .as_ref()
            .map(|a| a.generator().writer().root().to_path_buf())
            .unwrap_or_else(|| self.runtime.config().project_root.clone());
        self.flow.start(mode, project)?;

        let action = CommandAction::new(
            mode.as_str(),
            command.clone(),
            cwd,
            self.runtime.runner(),
            self.runtime.bus().clone(),
        )
        .with_timeout(self.runtime.config().tool_timeout());

        let output = action.run(cancel).await.map_err(|e| action_failed(mode.as_str(), e))?;
        let records = action.check(&output);
        if !records.is_empty() {
            self.runtime.recovery().report(&records);
            return Err(KernelError::FlowFailed {
                node: mode.as_str().to_string(),
                message: first_message(&records),
            });
        }
        if let Some(event_type) = announce {
            self.runtime.bus().emit(
                Event::new(event_type, output.stdout.clone())
                    .with_data(json!({ "command": command, "exit_code": output.exit_code })),
            );
        }
        self.flow.finish();
        self.runtime.bus().emit(
            Event::new(EventType::Done, format!("`{}` finished", command))
                .with_data(json!({ "mode": mode.as_str(), "exit_code": output.exit_code })),
        );
        self.persist();
        Ok(RunOutcome::Executed {
            command,
            exit_code: output.exit_code,
        })
    }

    /// Snapshot, abort the flow and emit the terminal `error{cancelled}`.
    fn cancelled(&mut self) {
        let checksums = self
            .actions
            .as_ref()
            .map(|a| a.generator().writer().checksums())
            .unwrap_or_default();
        self.runtime
            .recovery()
            .snapshot("cancelled", self.flow.state(), self.graph.metadata(), checksums);
        self.flow.abort("cancelled");
        info!("Run cancelled");
        self.runtime.bus().emit(
            Event::new(EventType::Error, "Cancelled").with_data(json!({
                "cancelled": true,
                "kind": ErrorKind::CancelError,
            })),
        );
        self.persist();
    }

    fn fail(&mut self, error: &KernelError) {
        warn!("Run failed: {}", error);
        let bus = self.runtime.bus();
        bus.emit(Event::new(EventType::Error, error.to_string()).debug());
        bus.emit(
            Event::new(EventType::Error, user_message(&error.to_string())).with_data(json!({
                "cancelled": false,
                "kind": error.kind(),
                "severity": error.severity(),
            })),
        );
        self.flow.abort(error.to_string());
        self.persist();
    }

    fn context(&self) -> Value {
        match &self.actions {
            Some(actions) => {
                let context = SessionContext {
                    plan: actions.plan().as_ref().clone(),
                    project_path: actions.generator().writer().root().to_path_buf(),
                    model: self.model.clone(),
                };
                serde_json::to_value(context).unwrap_or(Value::Null)
            }
            None => Value::Null,
        }
    }

    /// Write the session to the store. Failures are logged.
    pub fn persist(&self) {
        let context = self.context();
        Checkpoint {
            runtime: &self.runtime,
            session: &self.session,
            context: &context,
        }
        .save(self.flow.state(), self.graph.metadata());
    }
}

fn action_failed(node: &str, error: forge_core::ActionError) -> KernelError {
    if error.is_cancelled() {
        KernelError::Cancelled
    } else {
        KernelError::FlowFailed {
            node: node.to_string(),
            message: error.message,
        }
    }
}

fn first_message(records: &[ErrorRecord]) -> String {
    records
        .first()
        .map(ErrorRecord::public_message)
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Features named after "with" in a platform turn.
fn parse_features(turn: &str) -> Vec<String> {
    let lower = turn.to_lowercase();
    let Some((_, tail)) = lower.split_once(" with ") else {
        return Vec::new();
    };
    tail.split(',')
        .flat_map(|part| part.split(" and "))
        .map(|f| f.trim().trim_end_matches('.').to_string())
        .filter(|f| !f.is_empty())
        .collect()
}

/// The command of a terminal turn: leading filler words and quotes removed.
fn extract_command(turn: &str) -> String {
    let mut rest = turn.trim();
    loop {
        let lower = rest.to_lowercase();
        let Some(prefix) = TERMINAL_PREFIXES.iter().find(|p| {
            lower.starts_with(*p)
                && lower[p.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| c.is_whitespace() || c == ':' || p.starts_with(':'))
        }) else {
            break;
        };
        rest = rest[prefix.len()..].trim_start();
    }
    rest.trim_matches(|c| c == '`' || c == '"' || c == '\'').trim().to_string()
}

/// Snapshot and persistence helpers borrowed from the orchestrator.
struct Checkpoint<'a> {
    runtime: &'a Runtime,
    session: &'a RuntimeConfig,
    context: &'a Value,
}

impl Checkpoint<'_> {
    fn snapshot(&self, description: String, flow: &FlowState, graph: &ActionGraph, writer: &FileWriter) -> String {
        self.runtime
            .recovery()
            .snapshot(description, flow, graph.metadata(), writer.checksums())
    }

    fn save(&self, flow: &FlowState, graph: GraphMetadata) {
        let state = PersistedState::new(self.session.clone(), flow.clone(), graph)
            .with_events(self.runtime.bus().tail(self.runtime.config().events_tail))
            .with_snapshot(self.runtime.recovery().latest_snapshot())
            .with_context(self.context.clone());
        if let Err(e) = self.runtime.store().save(&state) {
            warn!("Failed to persist session {}: {}", self.session.session_id, e);
        }
    }
}

/// Keeps the flow step and todo list in line with the graph, and
/// checkpoints after every completed node.
struct KernelObserver<'a> {
    flow: &'a mut FlowManager,
    checkpoint: Checkpoint<'a>,
    writer: &'a FileWriter,
}

impl GraphObserver for KernelObserver<'_> {
    fn on_node_started(&mut self, graph: &ActionGraph, id: &str) {
        let Some(node) = graph.get(id) else {
            return;
        };
        let done = graph.count(NodeStatus::Completed) + graph.count(NodeStatus::Skipped);
        self.flow.next_step(StepRef::new(done + 1, graph.len(), node.label()));
    }

    fn on_node_finished(&mut self, graph: &ActionGraph, id: &str, status: NodeStatus) {
        let label = graph.get(id).map(|n| n.label().to_string()).unwrap_or_else(|| id.to_string());
        if status == NodeStatus::Completed {
            self.flow.complete_todo(&label);
            self.checkpoint
                .snapshot(format!("after {}", label), self.flow.state(), graph, self.writer);
        }
        self.checkpoint.save(self.flow.state(), graph.metadata());
    }
}

/// Gives recovery access to the graph, the flow and the generator.
struct KernelHost<'a> {
    graph: &'a mut ActionGraph,
    flow: &'a mut FlowManager,
    generator: &'a LiveGenerator,
    recovery: &'a RecoveryEngine,
    platform: Platform,
    cancel: &'a CancellationToken,
}

#[async_trait]
impl<'a> RecoveryHost for KernelHost<'a> {
    async fn regenerate(&mut self, path: &str, errors: &[ErrorRecord]) -> bool {
        match self.generator.regenerate(self.platform, path, errors, self.cancel).await {
            Ok(remaining) if remaining.is_empty() => true,
            Ok(remaining) => {
                debug!("{} still has {} problem(s) after rewrite", path, remaining.len());
                self.recovery.report(&remaining);
                false
            }
            Err(e) => {
                warn!("Rewrite of {} failed: {}", path, e);
                false
            }
        }
    }

    fn skip(&mut self, node: &str) -> bool {
        self.graph.skip(node).is_ok()
    }

    fn restore(&mut self, snapshot: &Snapshot) -> bool {
        if !self.flow.restore(snapshot.flow_state.clone()) {
            return false;
        }
        self.graph.restore_metadata(&snapshot.graph_metadata);
        true
    }

    fn retry(&mut self, node: &str) -> bool {
        self.graph.reset(node).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_features() {
        assert_eq!(
            parse_features("create a flutter todo app with dark mode, reminders and sync"),
            vec!["dark mode", "reminders", "sync"]
        );
        assert!(parse_features("create flutter todo app").is_empty());
    }

    #[test]
    fn test_extract_command() {
        assert_eq!(extract_command("run npm install"), "npm install");
        assert_eq!(extract_command("please execute `ls -la`"), "ls -la");
        assert_eq!(extract_command("terminal: flutter doctor"), "flutter doctor");
        assert_eq!(extract_command("runner --help"), "runner --help");
        assert_eq!(extract_command("run"), "");
        assert_eq!(extract_command("run:ls -la"), "ls -la");
    }
}
