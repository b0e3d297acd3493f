//! Model router: picks a model and fallbacks per task, and runs calls down
//! the fallback chain.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use forge_core::CancellationToken;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{Capability, CostTier, ModelInfo, ProviderRegistry, TaskType};
use crate::error::{LlmError, LlmResult};
use crate::telemetry::{AttemptOutcome, TelemetryRecord, TelemetrySink};
use crate::types::{ChatMessage, ChunkStream, Completion, GenerateOptions, Usage};

/// Fallbacks kept after the selected model.
pub const MAX_FALLBACKS: usize = 2;

/// Seed used for deterministic calls.
pub const DETERMINISTIC_SEED: u64 = 42;

/// Constraints for one routing decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRequest {
    pub streaming: bool,
    pub deterministic: bool,
    pub max_cost_tier: CostTier,
    pub latency_budget_ms: u64,
    pub required_capabilities: BTreeSet<Capability>,
    /// Model hint from the caller; wins when it survives filtering.
    pub preferred: Option<String>,
    pub max_tokens: Option<u32>,
}

impl Default for RouteRequest {
    fn default() -> Self {
        Self {
            streaming: false,
            deterministic: false,
            max_cost_tier: CostTier::High,
            latency_budget_ms: 60_000,
            required_capabilities: BTreeSet::new(),
            preferred: None,
            max_tokens: None,
        }
    }
}

impl RouteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    pub fn max_cost(mut self, tier: CostTier) -> Self {
        self.max_cost_tier = tier;
        self
    }

    pub fn latency_budget(mut self, ms: u64) -> Self {
        self.latency_budget_ms = ms;
        self
    }

    pub fn require(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }

    pub fn prefer(mut self, model: Option<impl Into<String>>) -> Self {
        self.preferred = model.map(Into::into);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A routing decision, attached to the call it was made for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDecision {
    pub task_type: TaskType,
    pub streaming: bool,
    pub deterministic: bool,
    pub cost_tier: CostTier,
    pub latency_budget_ms: u64,
    pub selected: String,
    pub fallbacks: Vec<String>,
    pub temperature: f32,
    pub seed: Option<u64>,
    pub max_tokens: Option<u32>,
    /// Constraints dropped to find a candidate, in the order they were dropped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relaxed: Vec<String>,
}

impl ModelDecision {
    /// `[selected, ...fallbacks]`.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.selected.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            temperature: self.temperature,
            seed: self.seed,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
        }
    }
}

/// Which constraints a filter pass still enforces.
#[derive(Clone, Copy)]
struct Constraints {
    capabilities: bool,
    latency: bool,
    cost: bool,
}

const RELAXATION: [(Constraints, &str); 4] = [
    (Constraints { capabilities: true, latency: true, cost: true }, ""),
    (Constraints { capabilities: false, latency: true, cost: true }, "capabilities"),
    (Constraints { capabilities: false, latency: false, cost: true }, "latency"),
    (Constraints { capabilities: false, latency: false, cost: false }, "cost"),
];

fn default_priorities() -> HashMap<TaskType, Vec<String>> {
    let list = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    HashMap::from([
        (TaskType::CodeGeneration, list(&["claude-sonnet-4", "gpt-4o", "gpt-4o-mini"])),
        (TaskType::Fixing, list(&["claude-sonnet-4", "gpt-4o", "gpt-4o-mini"])),
        (TaskType::Planning, list(&["claude-sonnet-4", "gpt-4o", "o1", "gpt-4o-mini"])),
        (TaskType::Reasoning, list(&["o1", "claude-sonnet-4"])),
        (TaskType::Dialog, list(&["claude-sonnet-4", "gpt-4o-mini", "claude-haiku", "gpt-4o"])),
    ])
}

fn default_temperature(task: TaskType) -> f32 {
    match task {
        TaskType::CodeGeneration | TaskType::Fixing => 0.2,
        TaskType::Planning => 0.3,
        TaskType::Dialog | TaskType::Reasoning => 0.7,
    }
}

/// Selects models and executes calls with fallback.
#[derive(Clone)]
pub struct ModelRouter {
    registry: Arc<ProviderRegistry>,
    priorities: HashMap<TaskType, Vec<String>>,
    telemetry: TelemetrySink,
}

impl ModelRouter {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            priorities: default_priorities(),
            telemetry: TelemetrySink::new(),
        }
    }

    /// Replace the priority list for one task.
    pub fn with_priority(mut self, task: TaskType, models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.priorities.insert(task, models.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_telemetry(mut self, sink: TelemetrySink) -> Self {
        self.telemetry = sink;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Whether any model can be called at all.
    pub fn is_online(&self) -> bool {
        self.registry.is_online()
    }

    /// Choose a model and up to two fallbacks for `task`.
    pub fn decide(&self, task: TaskType, req: &RouteRequest) -> LlmResult<ModelDecision> {
        let mut serving: Vec<&ModelInfo> = self
            .registry
            .available_models()
            .filter(|m| m.serves(task))
            .collect();
        // Streaming is never relaxed.
        if req.streaming {
            serving.retain(|m| m.supports_streaming);
        }

        let mut relaxed = Vec::new();
        let mut survivors = Vec::new();
        for (constraints, dropped) in RELAXATION {
            if !dropped.is_empty() {
                debug!("No model for {} under constraints; relaxing {}", task, dropped);
                relaxed.push(dropped.to_string());
            }
            survivors = serving
                .iter()
                .copied()
                .filter(|m| Self::passes(m, req, constraints))
                .collect();
            if !survivors.is_empty() {
                break;
            }
        }
        if survivors.is_empty() {
            return Err(LlmError::NoCandidate(task.to_string()));
        }

        let ordered = self.order(task, req, survivors);
        let selected = ordered[0].name.clone();
        let fallbacks: Vec<String> = ordered
            .iter()
            .skip(1)
            .take(MAX_FALLBACKS)
            .map(|m| m.name.clone())
            .collect();

        let (temperature, seed) = if req.deterministic {
            (0.0, Some(DETERMINISTIC_SEED))
        } else {
            (default_temperature(task), None)
        };

        debug!("Routed {} to {} (fallbacks: {:?})", task, selected, fallbacks);
        Ok(ModelDecision {
            task_type: task,
            streaming: req.streaming,
            deterministic: req.deterministic,
            cost_tier: req.max_cost_tier,
            latency_budget_ms: req.latency_budget_ms,
            selected,
            fallbacks,
            temperature,
            seed,
            max_tokens: req.max_tokens,
            relaxed,
        })
    }

    fn passes(model: &ModelInfo, req: &RouteRequest, c: Constraints) -> bool {
        (!c.capabilities || model.has_all(&req.required_capabilities))
            && (!c.latency || model.latency_ms <= req.latency_budget_ms)
            && (!c.cost || model.cost_tier <= req.max_cost_tier)
    }

    /// Preferred model first, then the task priority list, then catalog order.
    fn order<'a>(&self, task: TaskType, req: &RouteRequest, mut models: Vec<&'a ModelInfo>) -> Vec<&'a ModelInfo> {
        let priority = self.priorities.get(&task);
        let rank = |m: &ModelInfo| -> usize {
            if req.preferred.as_deref() == Some(m.name.as_str()) {
                return 0;
            }
            priority
                .and_then(|list| list.iter().position(|n| *n == m.name))
                .map(|p| p + 1)
                .unwrap_or(usize::MAX)
        };
        models.sort_by_key(|m| rank(m));
        models
    }

    fn cost_of(&self, model: &str, usage: Usage) -> f64 {
        self.registry
            .info(model)
            .map(|info| info.pricing.calculate(usage.input_tokens, usage.output_tokens))
            .unwrap_or(0.0)
    }

    fn provider_of(&self, model: &str) -> String {
        self.registry
            .info(model)
            .map(|info| info.provider.as_str().to_string())
            .unwrap_or_default()
    }

    fn record(&self, decision: &ModelDecision, model: &str, usage: Usage, started: Instant, outcome: AttemptOutcome) {
        self.telemetry.record(TelemetryRecord {
            model: model.to_string(),
            provider: self.provider_of(model),
            task: decision.task_type,
            streaming: decision.streaming,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            latency_ms: started.elapsed().as_millis() as u64,
            cost: self.cost_of(model, usage),
            outcome,
            timestamp: Utc::now(),
        });
    }

    fn outcome_of(err: &LlmError) -> AttemptOutcome {
        match err {
            LlmError::Cancelled => AttemptOutcome::Cancelled,
            other => AttemptOutcome::Failed {
                error: other.to_string(),
                transient: other.is_transient(),
            },
        }
    }

    /// Run a non-streaming call, trying `[selected, ...fallbacks]` in order.
    /// Only transient failures move on to the next model.
    pub async fn execute_with_fallback(
        &self,
        decision: &ModelDecision,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let opts = decision.options();
        let budget = Duration::from_millis(decision.latency_budget_ms);
        let mut last_error = None;

        for model in decision.candidates() {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            let client = match self.registry.client_for(model) {
                Ok(client) => client,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let started = Instant::now();
            let result = tokio::select! {
                r = tokio::time::timeout(budget, client.generate(model, messages, &opts)) => {
                    r.unwrap_or(Err(LlmError::Timeout(decision.latency_budget_ms)))
                }
                _ = cancel.cancelled() => Err(LlmError::Cancelled),
            };

            match result {
                Ok(completion) => {
                    self.record(decision, model, completion.usage, started, AttemptOutcome::Success);
                    return Ok(completion);
                }
                Err(e) => {
                    self.record(decision, model, Usage::default(), started, Self::outcome_of(&e));
                    if !e.is_transient() {
                        return Err(e);
                    }
                    warn!("Model {} failed ({}); trying next", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::NoCandidate(decision.task_type.to_string())))
    }

    /// Open a stream, trying `[selected, ...fallbacks]` in order.
    ///
    /// Fallback only covers establishing the stream; the latency budget
    /// bounds that step. Errors after the first chunk surface to the
    /// consumer. The attempt is recorded when the stream ends or is dropped.
    pub async fn stream_with_fallback(
        &self,
        decision: &ModelDecision,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> LlmResult<ChunkStream> {
        let opts = decision.options();
        let budget = Duration::from_millis(decision.latency_budget_ms);
        let mut last_error = None;

        for model in decision.candidates() {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            let client = match self.registry.client_for(model) {
                Ok(client) => client,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            let started = Instant::now();
            let result = tokio::select! {
                r = tokio::time::timeout(budget, client.stream(model, messages, &opts)) => {
                    r.unwrap_or(Err(LlmError::Timeout(decision.latency_budget_ms)))
                }
                _ = cancel.cancelled() => Err(LlmError::Cancelled),
            };

            match result {
                Ok(stream) => {
                    info!("Streaming from {}", model);
                    let mut guard = StreamRecorder {
                        router: self.clone(),
                        decision: decision.clone(),
                        model: model.to_string(),
                        started,
                        recorded: false,
                    };
                    return Ok(Box::pin(stream.inspect(move |item| guard.observe(item))));
                }
                Err(e) => {
                    self.record(decision, model, Usage::default(), started, Self::outcome_of(&e));
                    if !e.is_transient() {
                        return Err(e);
                    }
                    warn!("Model {} failed to stream ({}); trying next", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::NoCandidate(decision.task_type.to_string())))
    }
}

/// Records the telemetry of one streamed attempt exactly once.
struct StreamRecorder {
    router: ModelRouter,
    decision: ModelDecision,
    model: String,
    started: Instant,
    recorded: bool,
}

impl StreamRecorder {
    fn observe(&mut self, item: &LlmResult<crate::types::StreamChunk>) {
        if self.recorded {
            return;
        }
        match item {
            Ok(chunk) if chunk.done => {
                let usage = chunk.usage.unwrap_or_default();
                self.finish(usage, AttemptOutcome::Success);
            }
            Ok(_) => {}
            Err(e) => self.finish(Usage::default(), ModelRouter::outcome_of(e)),
        }
    }

    fn finish(&mut self, usage: Usage, outcome: AttemptOutcome) {
        self.recorded = true;
        self.router
            .record(&self.decision, &self.model, usage, self.started, outcome);
    }
}

impl Drop for StreamRecorder {
    fn drop(&mut self) {
        if !self.recorded {
            self.finish(Usage::default(), AttemptOutcome::Cancelled);
        }
    }
}
