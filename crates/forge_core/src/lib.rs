//! # forge_core
//!
//! Core orchestration primitives for AppForge.
//!
//! This crate holds everything the orchestrator needs that does not talk to
//! a model, a subprocess or the disk of a generated project.
//!
//! # Architecture
//!
//! - **Events**: The typed, scoped event bus; the only way state leaves the core
//! - **Pacing**: Character-class delays and cancellation-aware sleeps
//! - **Intent**: Keyword routing from a user turn to a flow mode
//! - **Flow**: The single live record of the current flow
//! - **Graph**: A DAG of reversible actions with dependency-ordered execution
//! - **Registry**: Maps action ids to callables so persisted graphs can resume
//! - **Arbitrator**: Picks exactly one agent proposal per decision cycle
//! - **Snapshot**: Metadata-only checkpoints retained in a bounded ring
//! - **Diagnostics**: Error records, severities and the error taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_core::{ActionGraph, ActionNode, FnAction};
//!
//! let mut graph = ActionGraph::new();
//! graph.add(ActionNode::new("pubspec", FnAction::ok("pubspec")))?;
//! graph.add(ActionNode::new("main", FnAction::ok("main")).requires("pubspec"))?;
//! graph.execute_all(false).await?;
//! ```

pub mod arbitrator;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod flow;
pub mod graph;
pub mod intent;
pub mod pacing;
pub mod registry;
pub mod snapshot;

pub use arbitrator::{AgentProposal, ArbitrationDecision, Arbitrator};
pub use config::{
    ControlMode, ForgeConfig, PostSteps, RuntimeConfig, SecurityLevel, StoreBackend, FORGE_DIR,
};
pub use diagnostics::{user_message, ErrorKind, ErrorRecord, ErrorType, Severity};
pub use error::{CoreError, CoreResult};
pub use events::{BusOptions, Event, EventBus, EventFilter, EventScope, EventType, Subscription};
pub use flow::{FlowManager, FlowOutcome, FlowState, StepRef};
pub use graph::{
    Action, ActionContext, ActionError, ActionGraph, ActionNode, FnAction, GraphMetadata,
    GraphObserver, GraphOutcome, NodeMeta, NodeStatus,
};
pub use intent::{Intent, IntentEngine, IntentMode, Platform};
pub use pacing::{pause, CharClass, Clock, InstantPacer, JitteredPacer, Pacer};
pub use registry::ActionRegistry;
pub use snapshot::{Snapshot, SnapshotRing, MIN_SNAPSHOTS};

/// Re-exported so downstream crates share one cancellation type.
pub use tokio_util::sync::CancellationToken;
