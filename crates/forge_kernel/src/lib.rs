//! # forge_kernel
//!
//! The orchestrator kernel of AppForge. It composes the core primitives, the
//! generation pipeline, the model router, the tool runner and the state
//! store behind one entry point, [`Orchestrator::run`].
//!
//! # Architecture
//!
//! - **Runtime**: per-session container for every shared service
//! - **Dialog**: conversational replies streamed as `thought` events
//! - **Actions**: file and post-step nodes, and the registry that re-binds them
//! - **Agents**: fix agents competing in the arbitrator
//! - **Security**: command policy for git and terminal turns
//! - **Orchestrator**: intent dispatch, graph execution with recovery, persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_core::{CancellationToken, ForgeConfig};
//! use forge_kernel::{Orchestrator, Runtime};
//!
//! let runtime = Runtime::builder(ForgeConfig::load(&root)?).build()?;
//! let mut orchestrator = Orchestrator::new(runtime);
//! orchestrator.run("create flutter todo app", None, &CancellationToken::new()).await?;
//! ```

pub mod actions;
pub mod agents;
pub mod dialog;
pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod security;

pub use actions::{CommandAction, FileAction, PostStep, ProjectActions};
pub use agents::{default_agents, DependencyReinstaller, FileRegenerator, FixAgent, FixContext, ManualAgent};
pub use dialog::{DialogSkill, OFFLINE_REPLY};
pub use error::{KernelError, KernelResult};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use runtime::{Runtime, RuntimeBuilder};
pub use security::{CommandPolicy, ALLOWED_PROGRAMS};
