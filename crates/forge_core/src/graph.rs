//! Action graph: a DAG of units of work with dependency-ordered execution.
//!
//! # Node lifecycle
//!
//! ```text
//! pending -> running -> completed
//!                    -> failed
//! pending | failed   -> skipped      (explicit skip)
//! failed | completed | skipped -> pending   (explicit reset or undo)
//! ```
//!
//! A failed node never becomes completed without an explicit reset. Skipped
//! nodes satisfy their dependents, so a skipped step lets the rest of the
//! graph continue.
//!
//! # Execution
//!
//! `execute_all` validates the graph, then runs rounds: every pending node
//! whose dependencies are satisfied is launched concurrently, completions are
//! appended to `execution_order` in the order they finish, and the loop
//! repeats until every node is terminal. A failed node ends the run after
//! its round; the caller decides whether to recover.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diagnostics::{ErrorKind, ErrorRecord};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventBus, EventType};
use crate::registry::ActionRegistry;

/// Status of a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether a dependency in this status lets dependents run.
    pub fn satisfies_dependents(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by an action.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
    /// Structured detail when the failure came from detected errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<ErrorRecord>,
}

impl ActionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            records: Vec::new(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::CancelError, "cancelled")
    }

    pub fn not_reversible() -> Self {
        Self::new(ErrorKind::FatalError, "action is not reversible")
    }

    pub fn with_records(mut self, records: Vec<ErrorRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::CancelError
    }
}

impl From<CoreError> for ActionError {
    fn from(err: CoreError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Inputs handed to an action when it runs.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub node_id: String,
    pub simulate: bool,
    pub cancel: CancellationToken,
    /// Results of completed dependencies, keyed by node id.
    pub inputs: HashMap<String, Value>,
}

impl ActionContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            simulate: false,
            cancel: CancellationToken::new(),
            inputs: HashMap::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A unit of work bound to a node.
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError>;

    /// Revert the effect of a completed execution.
    async fn undo(&self) -> Result<(), ActionError> {
        Err(ActionError::not_reversible())
    }
}

type ExecFn = dyn Fn(ActionContext) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync;
type UndoFn = dyn Fn() -> BoxFuture<'static, Result<(), ActionError>> + Send + Sync;

/// Action built from closures.
#[derive(Clone)]
pub struct FnAction {
    exec: Arc<ExecFn>,
    undo: Option<Arc<UndoFn>>,
}

impl FnAction {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        Self {
            exec: Arc::new(move |ctx| Box::pin(f(ctx))),
            undo: None,
        }
    }

    /// An action that always succeeds with `value`.
    pub fn ok(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    /// An action that always fails.
    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        let err = ActionError::new(kind, message);
        Self::new(move |_| {
            let err = err.clone();
            async move { Err(err) }
        })
    }

    pub fn with_undo<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        self.undo = Some(Arc::new(move || Box::pin(f())));
        self
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("undo", &self.undo.is_some())
            .finish()
    }
}

#[async_trait]
impl Action for FnAction {
    async fn execute(&self, ctx: ActionContext) -> Result<Value, ActionError> {
        (self.exec)(ctx).await
    }

    async fn undo(&self) -> Result<(), ActionError> {
        match &self.undo {
            Some(undo) => undo().await,
            None => Err(ActionError::not_reversible()),
        }
    }
}

/// One node of the graph.
#[derive(Clone)]
pub struct ActionNode {
    id: String,
    action: Arc<dyn Action>,
    requires: Vec<String>,
    reversible: bool,
    critical: bool,
    label: Option<String>,
    status: NodeStatus,
    result: Option<Value>,
    error: Option<ActionError>,
}

impl ActionNode {
    pub fn new(id: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::shared(id, Arc::new(action))
    }

    pub fn shared(id: impl Into<String>, action: Arc<dyn Action>) -> Self {
        Self {
            id: id.into(),
            action,
            requires: Vec::new(),
            reversible: false,
            critical: true,
            label: None,
            status: NodeStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Add a dependency. Duplicates are ignored.
    pub fn requires(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.requires.contains(&id) {
            self.requires.push(id);
        }
        self
    }

    pub fn requires_all<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self = self.requires(id);
        }
        self
    }

    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dependencies(&self) -> &[String] {
        &self.requires
    }

    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&ActionError> {
        self.error.as_ref()
    }

    fn meta(&self) -> NodeMeta {
        NodeMeta {
            id: self.id.clone(),
            requires: self.requires.clone(),
            status: self.status,
            reversible: self.reversible,
            critical: self.critical,
            label: self.label.clone(),
            error: self.error.as_ref().map(|e| e.message.clone()),
        }
    }
}

impl fmt::Debug for ActionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionNode")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .field("status", &self.status)
            .field("reversible", &self.reversible)
            .finish()
    }
}

/// Structural record of a node. Callables are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeMeta {
    pub id: String,
    #[serde(default)]
    pub requires: Vec<String>,
    pub status: NodeStatus,
    #[serde(default)]
    pub reversible: bool,
    #[serde(default = "default_critical")]
    pub critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_critical() -> bool {
    true
}

/// Persistable graph metadata: ids, statuses, edges and completion order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GraphMetadata {
    pub nodes: Vec<NodeMeta>,
    pub execution_order: Vec<String>,
}

impl GraphMetadata {
    pub fn status_of(&self, id: &str) -> Option<NodeStatus> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.status)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// How a call to `execute_all` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOutcome {
    /// Every node is terminal and none failed in this run.
    Completed,
    /// A node failed; the graph yielded to the caller.
    Failed { node: String, error: ActionError },
    /// The cancel token fired.
    Cancelled,
}

/// Hooks invoked while the graph runs.
pub trait GraphObserver: Send {
    fn on_node_started(&mut self, _graph: &ActionGraph, _id: &str) {}

    fn on_node_finished(&mut self, _graph: &ActionGraph, _id: &str, _status: NodeStatus) {}
}

struct NoopObserver;

impl GraphObserver for NoopObserver {}

/// DAG of action nodes.
#[derive(Default)]
pub struct ActionGraph {
    nodes: Vec<ActionNode>,
    index: HashMap<String, usize>,
    execution_order: Vec<String>,
    cancel: CancellationToken,
}

impl ActionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from nodes and validate.
    pub fn build(nodes: impl IntoIterator<Item = ActionNode>) -> CoreResult<Self> {
        let mut graph = Self::new();
        for node in nodes {
            graph.add(node)?;
        }
        graph.validate()?;
        Ok(graph)
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn set_cancel(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    /// Add a node. Dependencies may refer to nodes added later.
    pub fn add(&mut self, node: ActionNode) -> CoreResult<()> {
        if self.index.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode(node.id));
        }
        debug!(node = %node.id, requires = ?node.requires, "Adding action node");
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ActionNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ActionNode> {
        self.nodes.iter()
    }

    /// Completion order of the nodes currently completed.
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Pending nodes whose dependencies are all satisfied, in insertion order.
    pub fn executable(&self) -> Vec<&ActionNode> {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Pending)
            .filter(|n| {
                n.requires.iter().all(|r| {
                    self.get(r)
                        .map(|dep| dep.status.satisfies_dependents())
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_terminal())
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.nodes.iter().filter(|n| n.status == status).count()
    }

    /// Check referential integrity, then look for cycles with a DFS.
    pub fn validate(&self) -> CoreResult<()> {
        for node in &self.nodes {
            for dep in &node.requires {
                if !self.index.contains_key(dep) {
                    return Err(CoreError::UnknownDependency {
                        node: node.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut stack: Vec<usize> = Vec::new();

        fn visit(
            graph: &ActionGraph,
            at: usize,
            marks: &mut [Mark],
            stack: &mut Vec<usize>,
        ) -> CoreResult<()> {
            marks[at] = Mark::InProgress;
            stack.push(at);
            for dep in &graph.nodes[at].requires {
                let next = graph.index[dep];
                match marks[next] {
                    Mark::InProgress => {
                        let start = stack.iter().position(|&i| i == next).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|&i| graph.nodes[i].id.clone())
                            .collect();
                        path.push(graph.nodes[next].id.clone());
                        return Err(CoreError::CycleDetected { path });
                    }
                    Mark::Unvisited => visit(graph, next, marks, stack)?,
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks[at] = Mark::Done;
            Ok(())
        }

        for i in 0..self.nodes.len() {
            if marks[i] == Mark::Unvisited {
                visit(self, i, &mut marks, &mut stack)?;
            }
        }
        Ok(())
    }

    /// Run every runnable node. See the module docs for the policy.
    pub async fn execute_all(&mut self, simulate: bool) -> CoreResult<GraphOutcome> {
        self.execute_all_observed(simulate, &mut NoopObserver).await
    }

    pub async fn execute_all_observed(
        &mut self,
        simulate: bool,
        observer: &mut dyn GraphObserver,
    ) -> CoreResult<GraphOutcome> {
        self.validate()?;
        info!(nodes = self.nodes.len(), simulate, "Executing action graph");

        loop {
            if self.cancel.is_cancelled() {
                return Ok(GraphOutcome::Cancelled);
            }

            let ready: Vec<String> = self.executable().iter().map(|n| n.id.clone()).collect();
            if ready.is_empty() {
                let pending: Vec<String> = self
                    .nodes
                    .iter()
                    .filter(|n| n.status == NodeStatus::Pending)
                    .map(|n| n.id.clone())
                    .collect();
                if pending.is_empty() {
                    info!(completed = self.count(NodeStatus::Completed), "Action graph finished");
                    return Ok(GraphOutcome::Completed);
                }
                return Err(CoreError::Deadlock { pending });
            }
            debug!(round = ?ready, "Launching executable nodes");

            let mut running = FuturesUnordered::new();
            for id in &ready {
                let inputs = self.dependency_results(id);
                let idx = self.index[id];
                self.nodes[idx].status = NodeStatus::Running;
                self.nodes[idx].error = None;
                let action = Arc::clone(&self.nodes[idx].action);
                let ctx = ActionContext {
                    node_id: id.clone(),
                    simulate,
                    cancel: self.cancel.clone(),
                    inputs,
                };
                let id = id.clone();
                running.push(async move {
                    let result = if simulate {
                        Ok(serde_json::json!({ "simulated": true }))
                    } else {
                        action.execute(ctx).await
                    };
                    (id, result)
                });
            }
            for id in &ready {
                observer.on_node_started(self, id);
            }

            let mut first_failure: Option<(String, ActionError)> = None;
            let mut cancelled = false;

            while let Some((id, result)) = running.next().await {
                let idx = self.index[&id];
                let status = match result {
                    Ok(value) => {
                        let node = &mut self.nodes[idx];
                        node.status = NodeStatus::Completed;
                        node.result = Some(value);
                        self.execution_order.push(id.clone());
                        debug!(node = %id, "Action node completed");
                        NodeStatus::Completed
                    }
                    Err(err) => {
                        if err.is_cancelled() {
                            cancelled = true;
                        } else {
                            warn!(node = %id, error = %err, "Action node failed");
                        }
                        let node = &mut self.nodes[idx];
                        node.status = NodeStatus::Failed;
                        node.error = Some(err.clone());
                        if first_failure.is_none() && !err.is_cancelled() {
                            first_failure = Some((id.clone(), err));
                        }
                        NodeStatus::Failed
                    }
                };
                observer.on_node_finished(self, &id, status);
            }

            if cancelled || self.cancel.is_cancelled() {
                return Ok(GraphOutcome::Cancelled);
            }
            if let Some((node, error)) = first_failure {
                return Ok(GraphOutcome::Failed { node, error });
            }
        }
    }

    fn dependency_results(&self, id: &str) -> HashMap<String, Value> {
        let Some(node) = self.get(id) else {
            return HashMap::new();
        };
        node.requires
            .iter()
            .filter_map(|dep| {
                self.get(dep)
                    .and_then(|d| d.result.clone())
                    .map(|v| (dep.clone(), v))
            })
            .collect()
    }

    /// Undo the most recently completed node.
    ///
    /// Fails with `NotReversible` (leaving the node completed) when the node
    /// has no undo.
    pub async fn undo_last(&mut self) -> CoreResult<String> {
        let id = self.execution_order.pop().ok_or(CoreError::NothingToUndo)?;
        let idx = self.index[&id];
        if !self.nodes[idx].reversible {
            self.execution_order.push(id.clone());
            return Err(CoreError::NotReversible(id));
        }
        let action = Arc::clone(&self.nodes[idx].action);
        if let Err(err) = action.undo().await {
            self.execution_order.push(id.clone());
            return Err(CoreError::UndoFailed {
                node: id,
                message: err.message,
            });
        }
        let node = &mut self.nodes[idx];
        node.status = NodeStatus::Pending;
        node.result = None;
        info!(node = %id, "Action node undone");
        Ok(id)
    }

    /// Undo every completed node in reverse completion order.
    ///
    /// Non-reversible nodes stay completed; each one is reported through an
    /// internal event when a bus is given. Returns the ids that were undone.
    pub async fn undo_all(&mut self, bus: Option<&EventBus>) -> CoreResult<Vec<String>> {
        let order = std::mem::take(&mut self.execution_order);
        let mut kept: Vec<String> = Vec::new();
        let mut undone = Vec::new();

        let mut remaining = order.into_iter().rev();
        while let Some(id) = remaining.next() {
            let idx = self.index[&id];
            if !self.nodes[idx].reversible {
                debug!(node = %id, "Skipping undo of non-reversible node");
                if let Some(bus) = bus {
                    bus.emit(
                        Event::new(EventType::ThoughtInternal, format!("Cannot undo {}", id))
                            .internal()
                            .with("node", id.as_str())
                            .with("reason", "not_reversible"),
                    );
                }
                kept.push(id);
                continue;
            }
            let action = Arc::clone(&self.nodes[idx].action);
            if let Err(err) = action.undo().await {
                kept.push(id.clone());
                kept.extend(remaining);
                kept.reverse();
                self.execution_order = kept;
                return Err(CoreError::UndoFailed {
                    node: id,
                    message: err.message,
                });
            }
            let node = &mut self.nodes[idx];
            node.status = NodeStatus::Pending;
            node.result = None;
            undone.push(id);
        }

        kept.reverse();
        self.execution_order = kept;
        Ok(undone)
    }

    /// Return a terminal node to pending.
    pub fn reset(&mut self, id: &str) -> CoreResult<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound(id.to_string()))?;
        let node = &mut self.nodes[idx];
        match node.status {
            NodeStatus::Pending => return Ok(()),
            NodeStatus::Running => {
                return Err(CoreError::InvalidTransition {
                    node: id.to_string(),
                    from: node.status.to_string(),
                    to: NodeStatus::Pending.to_string(),
                })
            }
            _ => {}
        }
        node.status = NodeStatus::Pending;
        node.result = None;
        node.error = None;
        self.execution_order.retain(|e| e != id);
        debug!(node = %id, "Action node reset");
        Ok(())
    }

    /// Mark a pending or failed node as skipped.
    pub fn skip(&mut self, id: &str) -> CoreResult<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| CoreError::NodeNotFound(id.to_string()))?;
        let node = &mut self.nodes[idx];
        match node.status {
            NodeStatus::Pending | NodeStatus::Failed => {
                node.status = NodeStatus::Skipped;
                debug!(node = %id, "Action node skipped");
                Ok(())
            }
            NodeStatus::Skipped => Ok(()),
            other => Err(CoreError::InvalidTransition {
                node: id.to_string(),
                from: other.to_string(),
                to: NodeStatus::Skipped.to_string(),
            }),
        }
    }

    pub fn metadata(&self) -> GraphMetadata {
        GraphMetadata {
            nodes: self.nodes.iter().map(ActionNode::meta).collect(),
            execution_order: self.execution_order.clone(),
        }
    }

    /// Rebuild a graph from metadata, binding every id through the registry.
    ///
    /// Nodes persisted while running come back as pending.
    pub fn from_metadata(meta: &GraphMetadata, registry: &ActionRegistry) -> CoreResult<Self> {
        let mut graph = Self::new();
        for m in &meta.nodes {
            let action = registry.resolve(&m.id)?;
            let mut node = ActionNode::shared(m.id.clone(), action)
                .requires_all(m.requires.iter().cloned())
                .reversible(m.reversible)
                .critical(m.critical);
            node.label = m.label.clone();
            node.status = restored_status(m.status);
            node.error = m
                .error
                .as_ref()
                .map(|msg| ActionError::new(ErrorKind::FatalError, msg.clone()));
            graph.add(node)?;
        }
        graph.execution_order = restored_order(&graph, &meta.execution_order);
        graph.validate()?;
        Ok(graph)
    }

    /// Apply statuses from a snapshot onto this graph (rollback).
    ///
    /// Nodes absent from the metadata return to pending.
    pub fn restore_metadata(&mut self, meta: &GraphMetadata) {
        let saved: HashMap<&str, &NodeMeta> = meta.nodes.iter().map(|m| (m.id.as_str(), m)).collect();
        for node in self.nodes.iter_mut() {
            match saved.get(node.id.as_str()) {
                Some(m) => {
                    node.status = restored_status(m.status);
                    node.error = m
                        .error
                        .as_ref()
                        .map(|msg| ActionError::new(ErrorKind::FatalError, msg.clone()));
                    if node.status != NodeStatus::Completed {
                        node.result = None;
                    }
                }
                None => {
                    node.status = NodeStatus::Pending;
                    node.result = None;
                    node.error = None;
                }
            }
        }
        self.execution_order = restored_order(self, &meta.execution_order);
        info!(nodes = self.nodes.len(), "Action graph restored from snapshot");
    }
}

fn restored_status(status: NodeStatus) -> NodeStatus {
    match status {
        NodeStatus::Running => NodeStatus::Pending,
        other => other,
    }
}

fn restored_order(graph: &ActionGraph, order: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    order
        .iter()
        .filter(|id| {
            graph
                .get(id)
                .map(|n| n.status == NodeStatus::Completed)
                .unwrap_or(false)
        })
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

impl fmt::Debug for ActionGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionGraph")
            .field("nodes", &self.nodes)
            .field("execution_order", &self.execution_order)
            .finish()
    }
}
