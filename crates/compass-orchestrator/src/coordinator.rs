use std::sync::Arc;
use std::time::Duration;

use compass_core::{CoreError, Investigation, Observation, Worker};
use tokio_util::sync::CancellationToken;

/// How long a single worker gets to answer `observe` before it's treated as
/// a per-worker timeout rather than a whole-coordination failure.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub worker_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_timeout: DEFAULT_WORKER_TIMEOUT,
        }
    }
}

/// One worker's contribution to a round of observation, good or bad.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Observed(Observation),
    Failed { worker_id: String, error: String },
    TimedOut { worker_id: String },
}

/// The result of fanning a round of observation out across every registered
/// worker.
#[derive(Debug, Clone)]
pub struct CoordinationResult {
    pub outcomes: Vec<WorkerOutcome>,
    /// Arithmetic mean of successful workers' confidence, 0.0 if none
    /// reported successfully.
    pub rollup_confidence: f64,
    /// Elapsed wall time per worker id, in milliseconds.
    pub elapsed_ms: std::collections::HashMap<String, u128>,
    /// Cost reported per worker id, for workers that succeeded.
    pub cost_by_worker: std::collections::HashMap<String, f64>,
}

/// Fans observation requests out across workers concurrently and tolerates
/// partial failure: a worker erroring or timing out is recorded and
/// coordination continues, with the sole exception of
/// [`CoreError::BudgetExceeded`], which aborts the round immediately since
/// continuing to spend against an already-exhausted budget makes no sense.
pub struct ObservationCoordinator {
    config: CoordinatorConfig,
}

impl ObservationCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    pub async fn coordinate(
        &self,
        workers: &[Arc<dyn Worker>],
        investigation: &Investigation,
        cancellation: &CancellationToken,
    ) -> Result<CoordinationResult, CoreError> {
        tracing::info!(
            investigation_id = %investigation.id,
            worker_count = workers.len(),
            "coordination.round_started"
        );

        let futures = workers.iter().map(|worker| {
            let worker = Arc::clone(worker);
            let timeout = self.config.worker_timeout;
            let cancellation = cancellation.clone();
            async move {
                let worker_id = worker.id().to_string();
                let started = std::time::Instant::now();

                let outcome = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        return (worker_id, started.elapsed(), Err(CoreError::Cancelled));
                    }
                    result = tokio::time::timeout(timeout, worker.observe(investigation)) => {
                        result
                    }
                };

                let elapsed = started.elapsed();
                match outcome {
                    Ok(Ok(observation)) => (worker_id, elapsed, Ok(observation)),
                    Ok(Err(error)) => (worker_id, elapsed, Err(error)),
                    Err(_timed_out) => (worker_id, elapsed, Err(CoreError::Transport {
                        backend: worker.id().to_string(),
                        message: "worker timed out".to_string(),
                    })),
                }
            }
        });

        let results = futures::future::join_all(futures).await;

        let mut outcomes = Vec::with_capacity(results.len());
        let mut elapsed_ms = std::collections::HashMap::new();
        let mut cost_by_worker = std::collections::HashMap::new();
        let mut confidences = Vec::new();

        for (worker_id, elapsed, result) in results {
            elapsed_ms.insert(worker_id.clone(), elapsed.as_millis());

            match result {
                Ok(observation) => {
                    confidences.push(observation.confidence);
                    cost_by_worker.insert(worker_id.clone(), observation.reported_cost);
                    investigation.add_observation(observation.data.clone());
                    if observation.reported_cost > 0.0 {
                        investigation.add_cost(observation.reported_cost)?;
                    }
                    outcomes.push(WorkerOutcome::Observed(observation));
                }
                Err(CoreError::BudgetExceeded { .. }) => {
                    tracing::error!(
                        investigation_id = %investigation.id,
                        worker_id = %worker_id,
                        "coordination.aborted_on_budget_exceeded"
                    );
                    return Err(CoreError::BudgetExceeded {
                        investigation_id: investigation.id.to_string(),
                        new_total: investigation.total_cost(),
                        budget_limit: investigation.budget_limit,
                        overrun: investigation.total_cost() - investigation.budget_limit,
                    });
                }
                Err(CoreError::Transport { message, .. }) if message == "worker timed out" => {
                    tracing::warn!(worker_id = %worker_id, "coordination.worker_timed_out");
                    outcomes.push(WorkerOutcome::TimedOut { worker_id });
                }
                Err(error) => {
                    tracing::warn!(worker_id = %worker_id, error = %error, "coordination.worker_failed");
                    outcomes.push(WorkerOutcome::Failed {
                        worker_id,
                        error: error.to_string(),
                    });
                }
            }
        }

        let rollup_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        tracing::info!(
            investigation_id = %investigation.id,
            observed = confidences.len(),
            rollup_confidence,
            "coordination.round_completed"
        );

        Ok(CoordinationResult {
            outcomes,
            rollup_confidence,
            elapsed_ms,
            cost_by_worker,
        })
    }
}
