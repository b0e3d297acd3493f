//! Routing preferences shared by the planner and the generator.

use forge_core::ForgeConfig;
use forge_llm::{CostTier, RouteRequest};

/// How pipeline stages ask the router for a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub deterministic: bool,
    pub cost_tier: CostTier,
    pub latency_budget_ms: u64,
    /// Preferred model; routing still applies when it cannot serve a task.
    pub model: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            deterministic: false,
            cost_tier: CostTier::High,
            latency_budget_ms: 60_000,
            model: None,
        }
    }
}

impl ModelSettings {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            deterministic: config.deterministic,
            cost_tier: CostTier::parse(&config.cost_tier).unwrap_or(CostTier::High),
            latency_budget_ms: config.latency_budget_ms,
            model: config.model.clone(),
        }
    }

    pub fn request(&self, streaming: bool) -> RouteRequest {
        RouteRequest::new()
            .streaming(streaming)
            .deterministic(self.deterministic)
            .max_cost(self.cost_tier)
            .latency_budget(self.latency_budget_ms)
            .prefer(self.model.clone())
    }
}
