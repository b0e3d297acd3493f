//! Per-attempt model telemetry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::TaskType;

/// Outcome of one model attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed { error: String, transient: bool },
    Cancelled,
}

/// One model attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub model: String,
    pub provider: String,
    pub task: TaskType,
    pub streaming: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: u64,
    /// USD, from catalog pricing.
    pub cost: f64,
    pub outcome: AttemptOutcome,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryRecord {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// In-memory sink for telemetry records.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySink {
    records: Arc<RwLock<Vec<TelemetryRecord>>>,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: TelemetryRecord) {
        match &record.outcome {
            AttemptOutcome::Success => info!(
                model = %record.model,
                task = %record.task,
                input_tokens = record.input_tokens,
                output_tokens = record.output_tokens,
                latency_ms = record.latency_ms,
                cost = record.cost,
                "Model call succeeded"
            ),
            AttemptOutcome::Failed { error, transient } => warn!(
                model = %record.model,
                task = %record.task,
                transient = *transient,
                latency_ms = record.latency_ms,
                "Model call failed: {}",
                error
            ),
            AttemptOutcome::Cancelled => info!(model = %record.model, "Model call cancelled"),
        }
        self.records.write().push(record);
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.records.read().iter().map(|r| r.cost).sum()
    }

    pub fn total_tokens(&self) -> (u64, u64) {
        self.records
            .read()
            .iter()
            .fold((0, 0), |(i, o), r| (i + r.input_tokens, o + r.output_tokens))
    }
}
