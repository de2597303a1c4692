use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evidence::Evidence;

/// The record of one falsification test run against a [`crate::Hypothesis`].
/// Immutable once constructed; strategies build these, the engine appends
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisproofAttempt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub method: String,
    pub expected_if_true: String,
    pub observed: String,
    pub disproven: bool,
    pub evidence: Vec<Evidence>,
    pub reasoning: String,
    /// Wall-time (seconds) and token cost incurred running this attempt.
    pub cost: HashMap<String, f64>,
}

impl DisproofAttempt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        strategy: impl Into<String>,
        method: impl Into<String>,
        expected_if_true: impl Into<String>,
        observed: impl Into<String>,
        disproven: bool,
        evidence: Vec<Evidence>,
        reasoning: impl Into<String>,
        cost: HashMap<String, f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            strategy: strategy.into(),
            method: method.into(),
            expected_if_true: expected_if_true.into(),
            observed: observed.into(),
            disproven,
            evidence,
            reasoning: reasoning.into(),
            cost,
        }
    }

    pub fn to_audit_log(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "timestamp": self.timestamp.to_rfc3339(),
            "strategy": self.strategy,
            "method": self.method,
            "expected_if_true": self.expected_if_true,
            "observed": self.observed,
            "disproven": self.disproven,
            "evidence": self.evidence.iter().map(Evidence::to_audit_log).collect::<Vec<_>>(),
            "reasoning": self.reasoning,
            "cost": self.cost,
        })
    }
}
