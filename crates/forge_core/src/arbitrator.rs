//! Agent arbitration: exactly one proposal wins per decision cycle.
//!
//! Proposals older than the timeout window, with low confidence, or (unless
//! explicitly allowed) with high risk are discarded. The survivors are
//! ranked by `confidence * priority - 0.5 * risk`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Proposals older than this are discarded.
pub const PROPOSAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const MIN_CONFIDENCE: f64 = 0.3;
pub const MAX_RISK: f64 = 0.8;
/// Above this risk the winner needs a human.
pub const APPROVAL_RISK: f64 = 0.7;
/// Below this confidence the winner needs a human.
pub const APPROVAL_CONFIDENCE: f64 = 0.5;

/// One candidate agent's proposed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProposal {
    pub agent: String,
    pub action: String,
    pub confidence: f64,
    pub risk: f64,
    pub priority: f64,
    pub estimated_steps: u32,
    pub reasoning: String,
    pub requires_human: bool,
    pub created_at: DateTime<Utc>,
}

impl AgentProposal {
    pub fn new(agent: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            action: action.into(),
            confidence: 0.5,
            risk: 0.0,
            priority: 0.5,
            estimated_steps: 1,
            reasoning: String::new(),
            requires_human: false,
            created_at: Utc::now(),
        }
    }

    /// Set confidence, risk and priority; each is clamped to `[0, 1]`.
    pub fn scored(mut self, confidence: f64, risk: f64, priority: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self.risk = clamp_unit(risk);
        self.priority = clamp_unit(priority);
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.estimated_steps = steps;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn requiring_human(mut self) -> Self {
        self.requires_human = true;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn score(&self) -> f64 {
        self.confidence * self.priority - 0.5 * self.risk
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Result of one decision cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArbitrationDecision {
    pub agent: String,
    pub action: String,
    pub score: f64,
    pub requires_human_approval: bool,
    pub reasoning: String,
    /// The accepted proposal; `None` for the fallback decision.
    pub winner: Option<AgentProposal>,
    /// Every other proposal, marked rejected.
    pub rejected: Vec<AgentProposal>,
}

impl ArbitrationDecision {
    /// Conservative decision when nothing survives filtering.
    pub fn fallback(rejected: Vec<AgentProposal>) -> Self {
        Self {
            agent: "default".to_string(),
            action: "wait".to_string(),
            score: 0.0,
            requires_human_approval: true,
            reasoning: "No proposal met the arbitration thresholds".to_string(),
            winner: None,
            rejected,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.winner.is_none()
    }
}

/// Single-winner arbitrator.
#[derive(Debug, Clone)]
pub struct Arbitrator {
    timeout: Duration,
}

impl Default for Arbitrator {
    fn default() -> Self {
        Self {
            timeout: PROPOSAL_TIMEOUT,
        }
    }
}

impl Arbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn arbitrate(&self, proposals: Vec<AgentProposal>, allow_high_risk: bool) -> ArbitrationDecision {
        self.arbitrate_at(proposals, Utc::now(), allow_high_risk)
    }

    /// Arbitrate as of `now`.
    pub fn arbitrate_at(
        &self,
        proposals: Vec<AgentProposal>,
        now: DateTime<Utc>,
        allow_high_risk: bool,
    ) -> ArbitrationDecision {
        let timeout = chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::seconds(30));

        let (mut survivors, mut rejected): (Vec<_>, Vec<_>) = proposals.into_iter().partition(|p| {
            now.signed_duration_since(p.created_at) <= timeout
                && p.confidence >= MIN_CONFIDENCE
                && (allow_high_risk || p.risk <= MAX_RISK)
        });
        debug!(
            survivors = survivors.len(),
            filtered = rejected.len(),
            "Arbitrating agent proposals"
        );

        if survivors.is_empty() {
            info!("No proposal survived arbitration; falling back to wait");
            return ArbitrationDecision::fallback(rejected);
        }

        // Stable sort keeps submission order among equal scores.
        survivors.sort_by(|a, b| b.score().total_cmp(&a.score()));
        let winner = survivors.remove(0);
        rejected.extend(survivors);

        let requires_human_approval = winner.requires_human
            || winner.risk > APPROVAL_RISK
            || winner.confidence < APPROVAL_CONFIDENCE;

        info!(
            agent = %winner.agent,
            action = %winner.action,
            score = winner.score(),
            requires_human_approval,
            "Arbitration winner"
        );

        ArbitrationDecision {
            agent: winner.agent.clone(),
            action: winner.action.clone(),
            score: winner.score(),
            requires_human_approval,
            reasoning: winner.reasoning.clone(),
            winner: Some(winner),
            rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_score_wins() {
        let arbitrator = Arbitrator::new();
        let decision = arbitrator.arbitrate(
            vec![
                AgentProposal::new("a", "retry").scored(0.6, 0.1, 0.5),
                AgentProposal::new("b", "regenerate").scored(0.9, 0.2, 0.9),
                AgentProposal::new("c", "install").scored(0.8, 0.0, 0.4),
            ],
            false,
        );
        assert_eq!(decision.agent, "b");
        assert_eq!(decision.rejected.len(), 2);
        assert!(!decision.requires_human_approval);
    }

    #[test]
    fn test_filters_low_confidence_high_risk_and_stale() {
        let arbitrator = Arbitrator::new();
        let now = Utc::now();
        let proposals = vec![
            AgentProposal::new("low", "x").scored(0.2, 0.0, 1.0).created_at(now),
            AgentProposal::new("risky", "x").scored(0.9, 0.9, 1.0).created_at(now),
            AgentProposal::new("stale", "x")
                .scored(0.9, 0.0, 1.0)
                .created_at(now - chrono::Duration::seconds(31)),
        ];
        let decision = arbitrator.arbitrate_at(proposals.clone(), now, false);
        assert!(decision.is_fallback());
        assert_eq!(decision.agent, "default");
        assert_eq!(decision.action, "wait");
        assert!(decision.requires_human_approval);
        assert_eq!(decision.rejected.len(), 3);

        let decision = arbitrator.arbitrate_at(proposals, now, true);
        assert_eq!(decision.agent, "risky");
        assert!(decision.requires_human_approval);
    }

    #[test]
    fn test_low_confidence_winner_needs_approval() {
        let decision = Arbitrator::new().arbitrate(
            vec![AgentProposal::new("a", "x").scored(0.4, 0.0, 1.0)],
            false,
        );
        assert_eq!(decision.agent, "a");
        assert!(decision.requires_human_approval);
    }

    #[test]
    fn test_ties_keep_submission_order() {
        let decision = Arbitrator::new().arbitrate(
            vec![
                AgentProposal::new("first", "x").scored(0.8, 0.0, 0.5),
                AgentProposal::new("second", "x").scored(0.8, 0.0, 0.5),
            ],
            false,
        );
        assert_eq!(decision.agent, "first");
    }

    #[test]
    fn test_score_formula() {
        let p = AgentProposal::new("a", "x").scored(0.8, 0.4, 0.5);
        assert!((p.score() - 0.2).abs() < 1e-9);
    }
}
