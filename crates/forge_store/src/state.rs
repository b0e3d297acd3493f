//! The persisted session record and the store contract.

use forge_core::{Event, FlowState, GraphMetadata, RuntimeConfig, Snapshot, StoreBackend};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Events kept with a saved state when no cap is configured.
pub const DEFAULT_EVENTS_TAIL: usize = 200;

/// Everything needed to resume a session.
///
/// Graph metadata carries ids, statuses and edges only; callables are bound
/// again from a registry on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub runtime: RuntimeConfig,
    pub flow: FlowState,
    pub graph: GraphMetadata,
    /// The last N events, oldest first.
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub last_snapshot: Option<Snapshot>,
    /// Opaque data the orchestrator needs to re-bind the graph.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl PersistedState {
    pub fn new(runtime: RuntimeConfig, flow: FlowState, graph: GraphMetadata) -> Self {
        Self {
            runtime,
            flow,
            graph,
            events: Vec::new(),
            last_snapshot: None,
            context: serde_json::Value::Null,
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_snapshot(mut self, snapshot: Option<Snapshot>) -> Self {
        self.last_snapshot = snapshot;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.runtime.session_id
    }

    /// Drop all but the last `cap` events.
    pub fn truncate_events(&mut self, cap: usize) {
        if self.events.len() > cap {
            let excess = self.events.len() - cap;
            self.events.drain(..excess);
        }
    }
}

/// Persistence contract shared by every backend.
///
/// `load` returns the most recently saved session, or `None` when nothing
/// has been saved.
pub trait StateStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    fn save(&self, state: &PersistedState) -> StoreResult<()>;

    fn load(&self) -> StoreResult<Option<PersistedState>>;

    /// Remove the most recent session.
    fn clear(&self) -> StoreResult<()>;

    /// Saved session ids, most recent first.
    fn sessions(&self) -> StoreResult<Vec<String>>;
}
