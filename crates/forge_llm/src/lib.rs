//! Model access for the forge agent core.
//!
//! This crate provides:
//! - The [`ProviderClient`] contract with OpenAI, Anthropic and scripted
//!   implementations
//! - The [`ProviderRegistry`] catalog mapping model names to capabilities,
//!   pricing and a client
//! - The [`ModelRouter`], which picks a model per task and runs calls down the
//!   fallback chain while recording telemetry

pub mod anthropic;
pub mod catalog;
pub mod error;
pub mod openai;
pub mod provider;
pub mod router;
pub mod scripted;
pub mod sse;
pub mod telemetry;
pub mod types;

pub use anthropic::AnthropicClient;
pub use catalog::{
    default_catalog, Capability, CostTier, ModelInfo, ModelPricing, ProviderKind, ProviderRegistry, TaskType,
};
pub use error::{LlmError, LlmResult};
pub use openai::OpenAiClient;
pub use provider::ProviderClient;
pub use router::{ModelDecision, ModelRouter, RouteRequest, DETERMINISTIC_SEED, MAX_FALLBACKS};
pub use scripted::{ScriptRequest, ScriptedProvider};
pub use telemetry::{AttemptOutcome, TelemetryRecord, TelemetrySink};
pub use types::{collect_stream, ChatMessage, ChunkStream, Completion, GenerateOptions, Role, StreamChunk, Usage};
