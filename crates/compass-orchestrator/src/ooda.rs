use std::sync::Arc;

use compass_core::{
    CoreError, DecisionInterface, Investigation, InvestigationStatus, Worker,
};
use compass_disproof::DisproofEngine;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{CoordinatorConfig, ObservationCoordinator};
use crate::ranker::{HypothesisRanker, RankerConfig};

#[derive(Debug, Clone)]
pub struct OodaConfig {
    pub coordinator: CoordinatorConfig,
    pub ranker: RankerConfig,
    /// If validation ends INCONCLUSIVE or FAILED, whether to loop back to
    /// hypothesis generation (true) or fall through to INCONCLUSIVE (false,
    /// matching the original sequential loop's default).
    pub loop_on_failed_validation: bool,
    pub disproof_strategies: Vec<String>,
}

impl Default for OodaConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            ranker: RankerConfig::default(),
            loop_on_failed_validation: false,
            disproof_strategies: Vec::new(),
        }
    }
}

/// Outcome of one full Observe-Orient-Decide-Act pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OodaOutcome {
    Resolved,
    Inconclusive,
}

/// Sequences the four OODA phases over one investigation: fans observation
/// out to the worker pool, ranks the hypotheses they generate, hands the
/// ranked list to a human via the decision interface, then runs the
/// disproof engine against the selection. Cost is rolled up into the
/// investigation after every phase that can incur one.
pub struct OodaOrchestrator {
    coordinator: ObservationCoordinator,
    ranker: HypothesisRanker,
    disproof_engine: DisproofEngine,
    decision_interface: Arc<dyn DecisionInterface>,
    config: OodaConfig,
}

impl OodaOrchestrator {
    pub fn new(
        disproof_engine: DisproofEngine,
        decision_interface: Arc<dyn DecisionInterface>,
        config: OodaConfig,
    ) -> Self {
        Self {
            coordinator: ObservationCoordinator::new(config.coordinator.clone()),
            ranker: HypothesisRanker::new(config.ranker.clone()),
            disproof_engine,
            decision_interface,
            config,
        }
    }

    pub async fn run(
        &self,
        investigation: &Investigation,
        workers: &[Arc<dyn Worker>],
        cancellation: &CancellationToken,
    ) -> Result<OodaOutcome, CoreError> {
        loop {
            // Observe
            investigation.transition_to(InvestigationStatus::Observing)?;
            let coordination = self
                .coordinator
                .coordinate(workers, investigation, cancellation)
                .await?;

            if cancellation.is_cancelled() {
                return Err(CoreError::Cancelled);
            }

            // Orient: collect hypotheses from every worker that observed
            // successfully, then rank and deduplicate them.
            investigation.transition_to(InvestigationStatus::HypothesisGeneration)?;
            let mut candidates = Vec::new();
            for outcome in &coordination.outcomes {
                if let crate::coordinator::WorkerOutcome::Observed(observation) = outcome {
                    if let Some(worker) = workers.iter().find(|w| w.id() == observation.worker_id) {
                        let hypotheses = worker
                            .generate_hypothesis(observation, investigation)
                            .await?;
                        candidates.extend(hypotheses);
                    }
                }
            }

            if candidates.is_empty() {
                investigation.transition_to(InvestigationStatus::Inconclusive)?;
                return Ok(OodaOutcome::Inconclusive);
            }

            let ranking = self.ranker.rank(candidates);
            for ranked in &ranking.ranked {
                investigation.add_hypothesis(ranked.hypothesis.clone());
            }

            if ranking.ranked.is_empty() {
                investigation.transition_to(InvestigationStatus::Inconclusive)?;
                return Ok(OodaOutcome::Inconclusive);
            }

            // Decide
            investigation.transition_to(InvestigationStatus::AwaitingHuman)?;
            let ranked_hypotheses: Vec<_> = ranking.ranked.iter().map(|r| r.hypothesis.clone()).collect();
            let decision = self
                .decision_interface
                .decide(&ranked_hypotheses, investigation)
                .await?;
            if decision.reasoning.trim().is_empty() {
                tracing::warn!(
                    investigation_id = %investigation.id,
                    "ooda.decide.empty_reasoning"
                );
            }
            investigation.record_human_decision(compass_core::HumanDecision {
                hypothesis_id: decision.selected_hypothesis_id,
                reasoning: decision.reasoning.clone(),
                timestamp: decision.timestamp,
            });

            let Some(selected) = ranked_hypotheses
                .into_iter()
                .find(|h| h.id == decision.selected_hypothesis_id)
            else {
                return Err(CoreError::Validation(
                    "decision selected a hypothesis id not present in the ranked list".to_string(),
                ));
            };

            // Act: validate the selection against the disproof strategy suite.
            investigation.transition_to(InvestigationStatus::Validating)?;
            let validation = self
                .disproof_engine
                .validate(selected, &self.config.disproof_strategies)
                .await?;

            match validation.outcome {
                compass_disproof::DisproofOutcome::Survived => {
                    investigation.transition_to(InvestigationStatus::Resolved)?;
                    return Ok(OodaOutcome::Resolved);
                }
                compass_disproof::DisproofOutcome::Failed => {
                    if self.config.loop_on_failed_validation {
                        investigation.transition_to(InvestigationStatus::HypothesisGeneration)?;
                        continue;
                    }
                    // v1 default: RESOLVED with the refutation on the audit
                    // trail, rather than looping indefinitely.
                    investigation.transition_to(InvestigationStatus::Resolved)?;
                    return Ok(OodaOutcome::Resolved);
                }
                compass_disproof::DisproofOutcome::Inconclusive => {
                    investigation.transition_to(InvestigationStatus::Inconclusive)?;
                    return Ok(OodaOutcome::Inconclusive);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_test_support::{test_hypothesis, test_investigation, MockDecisionInterface, MockWorker};

    fn worker_with_hypothesis(id: &str, statement: &str, confidence: f64) -> Arc<dyn Worker> {
        let hyp = test_hypothesis(id, statement, confidence);
        Arc::new(MockWorker::new(id).with_hypotheses(vec![hyp]))
    }

    #[tokio::test]
    async fn runs_to_resolution_when_no_strategies_are_configured() {
        let investigation = test_investigation(10.0);
        let workers = vec![worker_with_hypothesis("agent-1", "pool exhausted", 0.8)];

        let disproof_engine = DisproofEngine::new();
        let decision_interface = Arc::new(MockDecisionInterface::selecting_first_ranked("looks right"));
        let orchestrator = OodaOrchestrator::new(disproof_engine, decision_interface, OodaConfig::default());

        let token = CancellationToken::new();
        let outcome = orchestrator.run(&investigation, &workers, &token).await.unwrap();

        // No strategies registered => DisproofOutcome::Inconclusive by definition,
        // and loop_on_failed_validation defaults to false.
        assert_eq!(outcome, OodaOutcome::Inconclusive);
        assert_eq!(investigation.status(), InvestigationStatus::Inconclusive);
        assert_eq!(investigation.human_decisions().len(), 1);
    }

    #[tokio::test]
    async fn no_hypotheses_generated_ends_inconclusive() {
        let investigation = test_investigation(10.0);
        let workers: Vec<Arc<dyn Worker>> = vec![Arc::new(MockWorker::new("agent-1"))];

        let disproof_engine = DisproofEngine::new();
        let decision_interface = Arc::new(MockDecisionInterface::selecting_first_ranked("n/a"));
        let orchestrator = OodaOrchestrator::new(disproof_engine, decision_interface, OodaConfig::default());

        let token = CancellationToken::new();
        let outcome = orchestrator.run(&investigation, &workers, &token).await.unwrap();

        assert_eq!(outcome, OodaOutcome::Inconclusive);
    }

    #[tokio::test]
    async fn cancellation_before_start_is_honored() {
        let investigation = test_investigation(10.0);
        let workers = vec![worker_with_hypothesis("agent-1", "pool exhausted", 0.8)];

        let disproof_engine = DisproofEngine::new();
        let decision_interface = Arc::new(MockDecisionInterface::selecting_first_ranked("n/a"));
        let orchestrator = OodaOrchestrator::new(disproof_engine, decision_interface, OodaConfig::default());

        let token = CancellationToken::new();
        token.cancel();
        let result = orchestrator.run(&investigation, &workers, &token).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
