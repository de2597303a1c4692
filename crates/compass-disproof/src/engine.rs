use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use compass_core::{CoreError, DisproofAttempt, Hypothesis};

/// Outcome of running a full strategy suite against one hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisproofOutcome {
    /// At least one attempt disproved the hypothesis.
    Failed,
    /// Every attempt ran and none disproved it.
    Survived,
    /// No attempt produced usable evidence (all inconclusive, or the
    /// strategy list was empty).
    Inconclusive,
}

/// A named falsification procedure. Implementations must never propagate
/// an error past `attempt_disproof` — missing metadata, empty query
/// results, and backend errors all resolve to a non-disprove attempt whose
/// `reasoning` explains why the attempt was inconclusive.
#[async_trait]
pub trait DisproofStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt_disproof(&self, hypothesis: &Hypothesis) -> DisproofAttempt;
}

/// Result of validating one hypothesis against a suite of strategies.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub hypothesis: Hypothesis,
    pub outcome: DisproofOutcome,
    pub attempts: Vec<DisproofAttempt>,
    pub updated_confidence: f64,
}

/// Runs named strategies against a hypothesis in the supplied order,
/// mutating it via `add_disproof_attempt` after each one. Continues past a
/// disproven attempt rather than short-circuiting, so the audit trail
/// reflects every strategy that ran.
pub struct DisproofEngine {
    strategies: HashMap<String, Arc<dyn DisproofStrategy>>,
}

impl DisproofEngine {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    pub fn register(&mut self, strategy: Arc<dyn DisproofStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Runs `strategy_names` in order, mutating `hypothesis` after each
    /// attempt. Unknown strategy names produce a local
    /// [`CoreError::Validation`] without touching the hypothesis.
    pub async fn validate(
        &self,
        mut hypothesis: Hypothesis,
        strategy_names: &[String],
    ) -> Result<ValidationResult, CoreError> {
        let mut attempts = Vec::with_capacity(strategy_names.len());
        let mut any_disproven = false;
        let mut any_attempt_produced_evidence = false;

        for name in strategy_names {
            let strategy = self.strategies.get(name).ok_or_else(|| {
                CoreError::Validation(format!("unknown disproof strategy: {name}"))
            })?;

            tracing::info!(strategy = %name, hypothesis_id = %hypothesis.id, "disproof.strategy.started");
            let attempt = strategy.attempt_disproof(&hypothesis).await;
            if attempt.disproven {
                any_disproven = true;
            }
            if !attempt.evidence.is_empty() {
                any_attempt_produced_evidence = true;
            }
            attempts.push(attempt.clone());
            hypothesis.add_disproof_attempt(attempt);
        }

        // A disproof short-circuits to FAILED regardless of whether later
        // attempts produced evidence; otherwise the outcome is SURVIVED only
        // if some attempt actually produced evidence, else INCONCLUSIVE
        // (covers an empty strategy list and all-attempts-missing-data runs).
        let outcome = if any_disproven {
            DisproofOutcome::Failed
        } else if any_attempt_produced_evidence {
            DisproofOutcome::Survived
        } else {
            DisproofOutcome::Inconclusive
        };

        let updated_confidence = hypothesis.current_confidence;

        Ok(ValidationResult {
            hypothesis,
            outcome,
            attempts,
            updated_confidence,
        })
    }
}

impl Default for DisproofEngine {
    fn default() -> Self {
        Self::new()
    }
}
