//! Provider registry: typed model catalog plus client handles.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::anthropic::AnthropicClient;
use crate::error::{LlmError, LlmResult};
use crate::openai::OpenAiClient;
use crate::provider::ProviderClient;

/// A capability a model may offer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Chat,
    Code,
    Reasoning,
    Vision,
    Tools,
    LongContext,
}

/// The abstract class of work used to pick a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Dialog,
    CodeGeneration,
    Planning,
    Reasoning,
    Fixing,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dialog => "dialog",
            Self::CodeGeneration => "code_generation",
            Self::Planning => "planning",
            Self::Reasoning => "reasoning",
            Self::Fixing => "fixing",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative price class; ordered cheapest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    Low,
    Medium,
    High,
}

impl CostTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Pricing information for a model (USD).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModelPricing {
    /// Cost per 1M input tokens
    pub input_per_million: f64,
    /// Cost per 1M output tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Calculate cost for given token counts
    pub fn calculate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_per_million;
        input_cost + output_cost
    }
}

/// Which vendor serves a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    /// In-process scripted provider used offline and in tests.
    Scripted,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Scripted => "scripted",
        }
    }
}

/// Static facts about a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub provider: ProviderKind,
    pub capabilities: BTreeSet<Capability>,
    pub tasks: Vec<TaskType>,
    pub context_tokens: u32,
    pub cost_tier: CostTier,
    /// Typical time to a complete answer.
    pub latency_ms: u64,
    pub supports_streaming: bool,
    pub supports_tools: bool,
    pub pricing: ModelPricing,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            name: name.into(),
            provider,
            capabilities: BTreeSet::from([Capability::Chat]),
            tasks: vec![TaskType::Dialog],
            context_tokens: 128_000,
            cost_tier: CostTier::Medium,
            latency_ms: 10_000,
            supports_streaming: true,
            supports_tools: false,
            pricing: ModelPricing::new(0.0, 0.0),
        }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self.supports_tools = self.capabilities.contains(&Capability::Tools);
        self
    }

    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskType>) -> Self {
        self.tasks = tasks.into_iter().collect();
        self
    }

    pub fn with_cost(mut self, tier: CostTier, pricing: ModelPricing) -> Self {
        self.cost_tier = tier;
        self.pricing = pricing;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn with_context(mut self, context_tokens: u32) -> Self {
        self.context_tokens = context_tokens;
        self
    }

    pub fn streaming(mut self, supported: bool) -> Self {
        self.supports_streaming = supported;
        self
    }

    pub fn serves(&self, task: TaskType) -> bool {
        self.tasks.contains(&task)
    }

    pub fn has_all(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

/// Maps model names to their info and to the client that serves them.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    models: Vec<ModelInfo>,
    clients: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the built-in catalog and no clients.
    pub fn with_default_catalog() -> Self {
        let mut registry = Self::new();
        for info in default_catalog() {
            registry.register_model(info);
        }
        registry
    }

    /// Built-in catalog with OpenAI/Anthropic clients for whichever keys are
    /// set in the environment.
    pub fn from_env() -> Self {
        let mut registry = Self::with_default_catalog();
        if let Some(client) = OpenAiClient::from_env() {
            registry.register_client(Arc::new(client));
        }
        if let Some(client) = AnthropicClient::from_env() {
            registry.register_client(Arc::new(client));
        }
        info!("Provider registry online: {}", registry.is_online());
        registry
    }

    /// Built-in catalog with every model served by one in-process client.
    /// Used for offline runs and tests.
    pub fn scripted(client: Arc<dyn ProviderClient>) -> Self {
        let mut registry = Self::new();
        for mut info in default_catalog() {
            info.provider = client.kind();
            registry.register_model(info);
        }
        registry.register_client(client);
        registry
    }

    /// Add or replace a model; insertion order is kept.
    pub fn register_model(&mut self, info: ModelInfo) {
        debug!("Registering model: {}", info.name);
        match self.models.iter_mut().find(|m| m.name == info.name) {
            Some(existing) => *existing = info,
            None => self.models.push(info),
        }
    }

    pub fn register_client(&mut self, client: Arc<dyn ProviderClient>) {
        debug!("Registering provider client: {}", client.kind().as_str());
        self.clients.insert(client.kind(), client);
    }

    pub fn info(&self, model: &str) -> LlmResult<&ModelInfo> {
        self.models
            .iter()
            .find(|m| m.name == model)
            .ok_or_else(|| LlmError::UnknownModel(model.to_string()))
    }

    pub fn client_for(&self, model: &str) -> LlmResult<Arc<dyn ProviderClient>> {
        let info = self.info(model)?;
        self.clients
            .get(&info.provider)
            .cloned()
            .ok_or_else(|| LlmError::NoClient(info.provider.as_str().to_string()))
    }

    /// A model is available when its provider has a client.
    pub fn is_available(&self, model: &str) -> bool {
        self.info(model)
            .map(|info| self.clients.contains_key(&info.provider))
            .unwrap_or(false)
    }

    /// Whether any model can be called.
    pub fn is_online(&self) -> bool {
        self.models.iter().any(|m| self.clients.contains_key(&m.provider))
    }

    /// Available models in insertion order.
    pub fn available_models(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models
            .iter()
            .filter(|m| self.clients.contains_key(&m.provider))
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }
}

/// Built-in model catalog.
pub fn default_catalog() -> Vec<ModelInfo> {
    use Capability::*;
    use TaskType as T;

    vec![
        ModelInfo::new("claude-sonnet-4", ProviderKind::Anthropic)
            .with_capabilities([Chat, Code, Reasoning, Tools, LongContext])
            .with_tasks([T::Dialog, T::CodeGeneration, T::Planning, T::Reasoning, T::Fixing])
            .with_cost(CostTier::High, ModelPricing::new(3.0, 15.0))
            .with_context(200_000)
            .with_latency(20_000),
        ModelInfo::new("gpt-4o", ProviderKind::OpenAi)
            .with_capabilities([Chat, Code, Vision, Tools])
            .with_tasks([T::Dialog, T::CodeGeneration, T::Planning, T::Fixing])
            .with_cost(CostTier::High, ModelPricing::new(2.5, 10.0))
            .with_latency(15_000),
        ModelInfo::new("gpt-4o-mini", ProviderKind::OpenAi)
            .with_capabilities([Chat, Code, Tools])
            .with_tasks([T::Dialog, T::CodeGeneration, T::Planning, T::Fixing])
            .with_cost(CostTier::Low, ModelPricing::new(0.15, 0.6))
            .with_latency(6_000),
        ModelInfo::new("claude-haiku", ProviderKind::Anthropic)
            .with_capabilities([Chat, Code])
            .with_tasks([T::Dialog, T::Planning])
            .with_cost(CostTier::Low, ModelPricing::new(0.8, 4.0))
            .with_context(200_000)
            .with_latency(4_000),
        ModelInfo::new("o1", ProviderKind::OpenAi)
            .with_capabilities([Chat, Reasoning, LongContext])
            .with_tasks([T::Reasoning, T::Planning])
            .with_cost(CostTier::High, ModelPricing::new(15.0, 60.0))
            .with_context(200_000)
            .with_latency(60_000)
            .streaming(false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedProvider;

    #[test]
    fn test_pricing_calculation() {
        let pricing = ModelPricing::new(3.0, 15.0);
        let cost = pricing.calculate(1_000_000, 200_000);
        assert!((cost - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_tier_ordering() {
        assert!(CostTier::Low < CostTier::Medium);
        assert!(CostTier::Medium < CostTier::High);
        assert_eq!(CostTier::parse("MEDIUM"), Some(CostTier::Medium));
        assert_eq!(CostTier::parse("cheap"), None);
    }

    #[test]
    fn test_availability_requires_client() {
        let mut registry = ProviderRegistry::with_default_catalog();
        assert!(!registry.is_online());
        assert!(matches!(registry.client_for("gpt-4o"), Err(LlmError::NoClient(_))));
        assert!(matches!(registry.info("gpt-9"), Err(LlmError::UnknownModel(_))));

        registry.register_model(ModelInfo::new("script", ProviderKind::Scripted));
        registry.register_client(Arc::new(ScriptedProvider::echo()));
        assert!(registry.is_online());
        assert!(registry.is_available("script"));
        assert!(!registry.is_available("gpt-4o"));
        assert_eq!(registry.available_models().count(), 1);
    }

    #[test]
    fn test_scripted_registry_serves_whole_catalog() {
        let registry = ProviderRegistry::scripted(Arc::new(ScriptedProvider::echo()));
        assert_eq!(registry.models().len(), default_catalog().len());
        assert!(registry.is_available("gpt-4o"));
        assert!(registry.is_available("claude-sonnet-4"));
    }

    #[test]
    fn test_reasoning_is_both_a_task_and_a_capability() {
        let catalog = default_catalog();
        let o1 = catalog.iter().find(|m| m.name == "o1").unwrap();
        assert!(o1.serves(TaskType::Reasoning));
        assert!(o1.serves(TaskType::Planning));
        assert!(!o1.serves(TaskType::CodeGeneration));
        assert!(o1.capabilities.contains(&Capability::Reasoning));
        assert!(!o1.supports_streaming);
    }

    #[test]
    fn test_register_model_replaces_in_place() {
        let mut registry = ProviderRegistry::with_default_catalog();
        let first = registry.models()[0].name.clone();
        registry.register_model(ModelInfo::new(first.clone(), ProviderKind::Scripted));
        assert_eq!(registry.models()[0].name, first);
        assert_eq!(registry.models()[0].provider, ProviderKind::Scripted);
        assert_eq!(registry.models().len(), default_catalog().len());
    }
}
