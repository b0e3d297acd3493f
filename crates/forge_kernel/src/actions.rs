//! Action implementations bound into the project graph.
//!
//! Node ids are stable so a persisted graph can be re-bound:
//! - `file:<path>` generates one planned file
//! - `post:install`, `post:build`, `post:preview`, `post:commit` run the
//!   platform's post-generation commands through the tool runner

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_core::{
    Action, ActionContext, ActionError, ActionGraph, ActionNode, ActionRegistry, CoreResult, ErrorKind, ErrorRecord,
    ErrorType, Event, EventBus, EventType, FnAction, PostSteps, Severity,
};
use forge_pipeline::{ErrorDetector, GenerationPlan, LiveGenerator};
use forge_runner::{drain_stream, CommandSpec, ExecOutput, RunnerError, StreamLine, ToolRunner};
use forge_templates::PostCommands;
use serde_json::{json, Value};
use tracing::{debug, info};

pub const FILE_PREFIX: &str = "file:";
pub const POST_PREFIX: &str = "post:";

pub fn file_node_id(path: &str) -> String {
    format!("{}{}", FILE_PREFIX, path)
}

/// Path of a `file:` node.
pub fn file_of(node: &str) -> Option<&str> {
    node.strip_prefix(FILE_PREFIX)
}

/// Steps run after the last file, in graph order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStep {
    Install,
    Build,
    Preview,
    Commit,
}

impl PostStep {
    pub const ALL: [PostStep; 4] = [Self::Install, Self::Build, Self::Preview, Self::Commit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Build => "build",
            Self::Preview => "preview",
            Self::Commit => "commit",
        }
    }

    pub fn node_id(&self) -> String {
        format!("{}{}", POST_PREFIX, self.as_str())
    }

    pub fn from_node(node: &str) -> Option<Self> {
        let name = node.strip_prefix(POST_PREFIX)?;
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    fn enabled(&self, steps: &PostSteps) -> bool {
        match self {
            Self::Install => steps.install,
            Self::Build => steps.build,
            Self::Preview => steps.preview,
            Self::Commit => steps.commit,
        }
    }

    /// A failed install or build stops the flow; preview and commit do not.
    fn is_critical(&self) -> bool {
        matches!(self, Self::Install | Self::Build)
    }
}

/// Generates one file of the plan.
pub struct FileAction {
    generator: LiveGenerator,
    plan: Arc<GenerationPlan>,
    index: usize,
}

impl FileAction {
    pub fn new(generator: LiveGenerator, plan: Arc<GenerationPlan>, index: usize) -> Self {
        Self { generator, plan, index }
    }

    fn path(&self) -> &str {
        self.plan.files.get(self.index).map(|f| f.path.as_str()).unwrap_or_default()
    }
}

#[async_trait]
impl Action for FileAction {
    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let generated = self.generator.generate(&self.plan, self.index, &ctx.cancel).await?;
        Ok(serde_json::to_value(&generated).unwrap_or_default())
    }

    /// Removes the file only if this session created it.
    async fn undo(&self) -> Result<(), ActionError> {
        self.generator.writer().remove(self.path())?;
        Ok(())
    }
}

/// Runs one post-generation command, streaming its output as
/// `terminal_output` events and feeding it to the error detector.
pub struct CommandAction {
    label: String,
    command: String,
    cwd: PathBuf,
    timeout: Duration,
    runner: Arc<dyn ToolRunner>,
    bus: EventBus,
    detector: ErrorDetector,
    /// Extra event emitted on success (`git` for commits, `preview` for previews).
    announce: Option<EventType>,
}

impl CommandAction {
    pub fn new(
        label: impl Into<String>,
        command: impl Into<String>,
        cwd: impl Into<PathBuf>,
        runner: Arc<dyn ToolRunner>,
        bus: EventBus,
    ) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            cwd: cwd.into(),
            timeout: forge_runner::DEFAULT_TIMEOUT,
            runner,
            bus,
            detector: ErrorDetector::new(),
            announce: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn announcing(mut self, event_type: EventType) -> Self {
        self.announce = Some(event_type);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the command and return its captured output. A non-zero exit is
    /// not an error here; see [`CommandAction::check`].
    pub async fn run(&self, cancel: &forge_core::CancellationToken) -> Result<ExecOutput, ActionError> {
        if cancel.is_cancelled() {
            return Err(ActionError::cancelled());
        }
        info!("Running {}: {}", self.label, self.command);
        self.bus.emit(
            Event::new(EventType::Terminal, format!("$ {}", self.command)).with_data(json!({
                "command": self.command,
                "step": self.label,
                "cwd": self.cwd.display().to_string(),
            })),
        );

        let spec = CommandSpec::new(self.command.clone())
            .cwd(self.cwd.clone())
            .timeout(self.timeout)
            .cancel(cancel.clone());
        let stream = self.runner.exec_stream(&spec).await.map_err(runner_error)?;

        let bus = &self.bus;
        let label = self.label.as_str();
        let output = drain_stream(stream, |line| {
            if let Some(text) = line.text() {
                let stream = if matches!(line, StreamLine::Stderr(_)) { "stderr" } else { "stdout" };
                bus.emit(Event::new(EventType::TerminalOutput, text).with_data(json!({
                    "line": text,
                    "stream": stream,
                    "step": label,
                })));
            }
        })
        .await;

        if cancel.is_cancelled() {
            return Err(ActionError::cancelled());
        }
        debug!("{} exited with {} in {} ms", self.label, output.exit_code, output.duration_ms);
        Ok(output)
    }

    /// Error records for a finished command, empty when it succeeded.
    pub fn check(&self, output: &ExecOutput) -> Vec<ErrorRecord> {
        if output.success() {
            return Vec::new();
        }
        let combined = output.combined_output();
        let mut records: Vec<ErrorRecord> = self
            .detector
            .detect(&combined)
            .into_iter()
            .filter(|r| r.severity >= Severity::Error)
            .collect();
        if records.is_empty() {
            records.push(
                ErrorRecord::new(
                    format!("`{}` exited with code {}", self.command, output.exit_code),
                    ErrorType::Build,
                    Severity::Error,
                )
                .with_raw(combined),
            );
        }
        records
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        let output = self.run(&ctx.cancel).await?;
        let records = self.check(&output);
        if !records.is_empty() {
            let kind = if records.iter().any(|r| r.error_type == ErrorType::Timeout) {
                ErrorKind::TimeoutError
            } else {
                ErrorKind::ToolError
            };
            return Err(ActionError::new(
                kind,
                format!("{} failed with exit code {}", self.label, output.exit_code),
            )
            .with_records(records));
        }

        if let Some(event_type) = self.announce {
            self.bus.emit(
                Event::new(event_type, format!("{} finished", self.label))
                    .with_data(json!({ "command": self.command, "exit_code": output.exit_code })),
            );
        }
        Ok(json!({
            "command": self.command,
            "exit_code": output.exit_code,
            "duration_ms": output.duration_ms,
        }))
    }
}

fn runner_error(err: RunnerError) -> ActionError {
    match err {
        RunnerError::Cancelled => ActionError::cancelled(),
        other => {
            let record = ErrorRecord::new(other.to_string(), ErrorType::Build, other.kind().default_severity());
            ActionError::new(other.kind(), other.to_string()).with_records(vec![record])
        }
    }
}

/// Everything needed to bind the actions of one project, for a fresh graph
/// or for one re-built from persisted metadata.
#[derive(Clone)]
pub struct ProjectActions {
    generator: LiveGenerator,
    plan: Arc<GenerationPlan>,
    runner: Arc<dyn ToolRunner>,
    bus: EventBus,
    commands: PostCommands,
    commit: String,
    steps: PostSteps,
    cwd: PathBuf,
    timeout: Duration,
}

impl ProjectActions {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generator: LiveGenerator,
        plan: Arc<GenerationPlan>,
        runner: Arc<dyn ToolRunner>,
        bus: EventBus,
        commands: PostCommands,
        commit: String,
        steps: PostSteps,
        timeout: Duration,
    ) -> Self {
        let cwd = generator.writer().root().to_path_buf();
        Self {
            generator,
            plan,
            runner,
            bus,
            commands,
            commit,
            steps,
            cwd,
            timeout,
        }
    }

    pub fn plan(&self) -> &Arc<GenerationPlan> {
        &self.plan
    }

    pub fn generator(&self) -> &LiveGenerator {
        &self.generator
    }

    pub fn command_for(&self, step: PostStep) -> Option<String> {
        match step {
            PostStep::Install => self.commands.install.clone(),
            PostStep::Build => self.commands.build.clone(),
            PostStep::Preview => self.commands.preview.clone(),
            PostStep::Commit => Some(self.commit.clone()),
        }
    }

    pub fn file_action(&self, path: &str) -> Option<FileAction> {
        let index = self.plan.files.iter().position(|f| f.path == path)?;
        Some(FileAction::new(self.generator.clone(), Arc::clone(&self.plan), index))
    }

    /// The command action for `step`, or `None` when the platform has no
    /// command for it.
    pub fn command_action(&self, step: PostStep) -> Option<CommandAction> {
        let command = self.command_for(step)?;
        let action = CommandAction::new(step.as_str(), command, self.cwd.clone(), Arc::clone(&self.runner), self.bus.clone())
            .with_timeout(self.timeout);
        Some(match step {
            PostStep::Commit => action.announcing(EventType::Git),
            PostStep::Preview => action.announcing(EventType::Preview),
            _ => action,
        })
    }

    /// One node per file, each requiring the previous file, then the
    /// enabled post steps chained after the last file.
    pub fn build_graph(&self) -> CoreResult<ActionGraph> {
        let mut graph = ActionGraph::new();
        let mut previous: Option<String> = None;

        for (index, file) in self.plan.files.iter().enumerate() {
            let id = file_node_id(&file.path);
            let action = FileAction::new(self.generator.clone(), Arc::clone(&self.plan), index);
            let mut node = ActionNode::new(id.clone(), action)
                .reversible(true)
                .critical(true)
                .with_label(file.path.clone());
            if let Some(prev) = &previous {
                node = node.requires(prev.clone());
            }
            graph.add(node)?;
            previous = Some(id);
        }

        for step in PostStep::ALL.into_iter().filter(|s| s.enabled(&self.steps)) {
            let Some(action) = self.command_action(step) else {
                debug!("No {} command for {}", step.as_str(), self.plan.platform);
                continue;
            };
            let id = step.node_id();
            let mut node = ActionNode::new(id.clone(), action)
                .critical(step.is_critical())
                .with_label(step.as_str());
            if let Some(prev) = &previous {
                node = node.requires(prev.clone());
            }
            graph.add(node)?;
            previous = Some(id);
        }

        graph.validate()?;
        Ok(graph)
    }

    /// Registry that binds `file:` and `post:` ids for this project.
    pub fn registry(&self) -> ActionRegistry {
        let mut registry = ActionRegistry::new();

        let files = self.clone();
        registry.register_prefix(FILE_PREFIX, move |id: &str| -> Arc<dyn Action> {
            let path = file_of(id).unwrap_or_default();
            match files.file_action(path) {
                Some(action) => Arc::new(action),
                None => Arc::new(FnAction::fail(
                    ErrorKind::PlanError,
                    format!("{} is not part of the plan", path),
                )),
            }
        });

        let posts = self.clone();
        registry.register_prefix(POST_PREFIX, move |id: &str| -> Arc<dyn Action> {
            match PostStep::from_node(id).and_then(|step| posts.command_action(step)) {
                Some(action) => Arc::new(action),
                None => Arc::new(FnAction::fail(ErrorKind::ToolError, format!("no command for {}", id))),
            }
        });

        registry
    }
}
