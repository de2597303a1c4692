use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::hypothesis::Hypothesis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Triggered,
    Observing,
    HypothesisGeneration,
    AwaitingHuman,
    Validating,
    Resolved,
    Inconclusive,
}

impl InvestigationStatus {
    /// The allowed outgoing edges for this status. A DAG with one
    /// back-edge (Validating -> HypothesisGeneration).
    fn valid_transitions(self) -> &'static [InvestigationStatus] {
        use InvestigationStatus::*;
        match self {
            Triggered => &[Observing],
            Observing => &[HypothesisGeneration],
            HypothesisGeneration => &[AwaitingHuman, Inconclusive],
            AwaitingHuman => &[Validating],
            Validating => &[Resolved, HypothesisGeneration, Inconclusive],
            Resolved => &[],
            Inconclusive => &[],
        }
    }
}

/// Context information that triggered the investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationContext {
    pub service: String,
    pub symptom: String,
    pub severity: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A human decision about which hypothesis to validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanDecision {
    pub hypothesis_id: Uuid,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

/// Default budget for a routine investigation, in USD. Use a higher limit
/// for critical incidents; budget is enforced at the investigation level,
/// not per-worker.
pub const DEFAULT_BUDGET_LIMIT_USD: f64 = 10.0;

const BUDGET_WARNING_UTILIZATION_PCT: f64 = 80.0;

struct MutableState {
    status: InvestigationStatus,
    updated_at: DateTime<Utc>,
    total_cost: f64,
}

/// The root aggregate. Owns its hypotheses and observations exclusively.
///
/// `status`, `updated_at`, and `total_cost` are serialized by an internal
/// mutex (`transition_to` and `add_cost` are the only mutators of that
/// trio), so concurrent callers observe a consistent state.
pub struct Investigation {
    pub id: Uuid,
    pub context: InvestigationContext,
    pub created_at: DateTime<Utc>,
    pub budget_limit: f64,

    state: Mutex<MutableState>,
    observations: Mutex<Vec<serde_json::Value>>,
    hypotheses: Mutex<Vec<Hypothesis>>,
    human_decisions: Mutex<Vec<HumanDecision>>,
}

impl Investigation {
    /// Factory: a fresh Investigation in TRIGGERED status.
    pub fn create(context: InvestigationContext, budget_limit: f64) -> Self {
        let now = Utc::now();
        let id = Uuid::new_v4();
        info!(
            investigation_id = %id,
            service = %context.service,
            symptom = %context.symptom,
            severity = %context.severity,
            budget_limit,
            "investigation.created"
        );
        Self {
            id,
            context,
            created_at: now,
            budget_limit,
            state: Mutex::new(MutableState {
                status: InvestigationStatus::Triggered,
                updated_at: now,
                total_cost: 0.0,
            }),
            observations: Mutex::new(Vec::new()),
            hypotheses: Mutex::new(Vec::new()),
            human_decisions: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> InvestigationStatus {
        self.state.lock().status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.lock().updated_at
    }

    pub fn total_cost(&self) -> f64 {
        self.state.lock().total_cost
    }

    /// Transition to `new_status`, failing with [`CoreError::InvalidTransition`]
    /// if no edge exists from the current status. On success, bumps
    /// `updated_at`. Leaves state untouched on failure.
    pub fn transition_to(&self, new_status: InvestigationStatus) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        let valid = state.status.valid_transitions();
        if !valid.contains(&new_status) {
            return Err(CoreError::InvalidTransition {
                from: format!("{:?}", state.status),
                to: format!("{:?}", new_status),
                valid: valid.iter().map(|s| format!("{s:?}")).collect(),
            });
        }

        let old_status = state.status;
        state.status = new_status;
        state.updated_at = Utc::now();
        let duration = (state.updated_at - self.created_at).num_milliseconds() as f64 / 1000.0;

        info!(
            investigation_id = %self.id,
            from_status = ?old_status,
            to_status = ?new_status,
            duration_seconds = duration,
            "investigation.state_transition"
        );
        Ok(())
    }

    pub fn add_observation(&self, observation: serde_json::Value) {
        self.observations.lock().push(observation);
    }

    pub fn observations(&self) -> Vec<serde_json::Value> {
        self.observations.lock().clone()
    }

    pub fn add_hypothesis(&self, hypothesis: Hypothesis) {
        self.hypotheses.lock().push(hypothesis);
    }

    pub fn hypotheses(&self) -> Vec<Hypothesis> {
        self.hypotheses.lock().clone()
    }

    pub fn record_human_decision(&self, decision: HumanDecision) {
        self.human_decisions.lock().push(decision);
    }

    pub fn human_decisions(&self) -> Vec<HumanDecision> {
        self.human_decisions.lock().clone()
    }

    /// Add `cost` to the running total, enforcing `budget_limit`.
    ///
    /// Computes the candidate total before mutating anything; if it would
    /// exceed `budget_limit`, returns [`CoreError::BudgetExceeded`] and the
    /// total is left unchanged. Emits a warning event at >=80% utilization.
    pub fn add_cost(&self, cost: f64) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        let new_total = state.total_cost + cost;

        if new_total > self.budget_limit {
            let overrun = new_total - self.budget_limit;
            tracing::error!(
                investigation_id = %self.id,
                cost_added = cost,
                total_cost = state.total_cost,
                new_total,
                budget_limit = self.budget_limit,
                overrun_amount = overrun,
                "investigation.budget_exceeded"
            );
            return Err(CoreError::BudgetExceeded {
                investigation_id: self.id.to_string(),
                new_total,
                budget_limit: self.budget_limit,
                overrun,
            });
        }

        state.total_cost = new_total;
        let utilization_pct = 100.0 * state.total_cost / self.budget_limit;

        if utilization_pct >= BUDGET_WARNING_UTILIZATION_PCT {
            warn!(
                investigation_id = %self.id,
                total_cost = state.total_cost,
                budget_limit = self.budget_limit,
                utilization_pct,
                remaining = self.budget_limit - state.total_cost,
                "investigation.budget_warning"
            );
        } else {
            info!(
                investigation_id = %self.id,
                cost_added = cost,
                total_cost = state.total_cost,
                budget_limit = self.budget_limit,
                utilization_pct,
                "investigation.cost_added"
            );
        }

        Ok(())
    }

    /// Duration between `created_at` and the last `updated_at`.
    pub fn get_duration(&self) -> chrono::Duration {
        self.updated_at() - self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InvestigationContext {
        InvestigationContext {
            service: "api-backend".into(),
            symptom: "500 errors spiking".into(),
            severity: "high".into(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn starts_triggered() {
        let inv = Investigation::create(ctx(), DEFAULT_BUDGET_LIMIT_USD);
        assert_eq!(inv.status(), InvestigationStatus::Triggered);
    }

    #[test]
    fn valid_transition_path_succeeds() {
        let inv = Investigation::create(ctx(), DEFAULT_BUDGET_LIMIT_USD);
        inv.transition_to(InvestigationStatus::Observing).unwrap();
        inv.transition_to(InvestigationStatus::HypothesisGeneration)
            .unwrap();
        inv.transition_to(InvestigationStatus::AwaitingHuman).unwrap();
        inv.transition_to(InvestigationStatus::Validating).unwrap();
        inv.transition_to(InvestigationStatus::Resolved).unwrap();
        assert_eq!(inv.status(), InvestigationStatus::Resolved);
    }

    #[test]
    fn p3_invalid_transition_leaves_state_unchanged() {
        let inv = Investigation::create(ctx(), DEFAULT_BUDGET_LIMIT_USD);
        let before_updated = inv.updated_at();
        let result = inv.transition_to(InvestigationStatus::Validating);
        assert!(result.is_err());
        assert_eq!(inv.status(), InvestigationStatus::Triggered);
        assert_eq!(inv.updated_at(), before_updated);
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        let inv = Investigation::create(ctx(), DEFAULT_BUDGET_LIMIT_USD);
        inv.transition_to(InvestigationStatus::Observing).unwrap();
        inv.transition_to(InvestigationStatus::HypothesisGeneration)
            .unwrap();
        inv.transition_to(InvestigationStatus::Inconclusive).unwrap();
        assert!(inv.transition_to(InvestigationStatus::Resolved).is_err());
        assert!(inv.transition_to(InvestigationStatus::Observing).is_err());
    }

    #[test]
    fn p4_add_cost_never_exceeds_budget() {
        let inv = Investigation::create(ctx(), 10.0);
        inv.add_cost(6.0).unwrap();
        let result = inv.add_cost(5.0);
        assert!(result.is_err());
        assert_eq!(inv.total_cost(), 6.0);
    }

    #[test]
    fn add_cost_accumulates_within_budget() {
        let inv = Investigation::create(ctx(), 10.0);
        inv.add_cost(3.0).unwrap();
        inv.add_cost(4.0).unwrap();
        assert_eq!(inv.total_cost(), 7.0);
    }
}
