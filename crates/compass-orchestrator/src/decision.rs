use std::io::Write as _;

use async_trait::async_trait;
use compass_core::{CoreError, DecisionInput, DecisionInterface, Hypothesis, Investigation};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A [`DecisionInterface`] that blocks on a console prompt, for local/manual
/// use. The actual read happens on a blocking thread and is bridged back
/// through a oneshot channel so a pending prompt can still be cancelled.
pub struct ConsoleDecisionInterface {
    cancellation: CancellationToken,
}

impl ConsoleDecisionInterface {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self { cancellation }
    }
}

#[async_trait]
impl DecisionInterface for ConsoleDecisionInterface {
    async fn decide(
        &self,
        ranked_hypotheses: &[Hypothesis],
        investigation: &Investigation,
    ) -> Result<DecisionInput, CoreError> {
        if ranked_hypotheses.is_empty() {
            return Err(CoreError::Validation(
                "cannot decide over an empty ranked hypothesis list".to_string(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let summaries: Vec<(uuid::Uuid, String, f64)> = ranked_hypotheses
            .iter()
            .map(|h| (h.id, h.statement.clone(), h.current_confidence))
            .collect();
        let investigation_id = investigation.id;

        tokio::task::spawn_blocking(move || {
            let selection = prompt_for_selection(investigation_id, &summaries);
            let _ = tx.send(selection);
        });

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(CoreError::Cancelled),
            received = rx => {
                let (selected_hypothesis_id, reasoning) = received.map_err(|_| CoreError::Cancelled)?;
                Ok(DecisionInput {
                    selected_hypothesis_id,
                    reasoning,
                    timestamp: chrono::Utc::now(),
                })
            }
        }
    }
}

fn prompt_for_selection(
    investigation_id: uuid::Uuid,
    summaries: &[(uuid::Uuid, String, f64)],
) -> (uuid::Uuid, String) {
    println!("Investigation {investigation_id}: select a hypothesis to validate");
    for (i, (_, statement, confidence)) in summaries.iter().enumerate() {
        println!("  [{}] {} (confidence {:.0}%)", i + 1, statement, confidence * 100.0);
    }
    print!("Enter number (default 1): ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    let index = if std::io::stdin().read_line(&mut line).is_ok() {
        line.trim().parse::<usize>().ok().filter(|n| *n >= 1 && *n <= summaries.len()).unwrap_or(1)
    } else {
        1
    };

    print!("Reasoning (optional): ");
    let _ = std::io::stdout().flush();
    let mut reasoning = String::new();
    let _ = std::io::stdin().read_line(&mut reasoning);

    (summaries[index - 1].0, reasoning.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_test_support::test_investigation;

    #[tokio::test]
    async fn rejects_empty_ranked_list() {
        let interface = ConsoleDecisionInterface::new(CancellationToken::new());
        let investigation = test_investigation(10.0);
        let result = interface.decide(&[], &investigation).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn cancellation_returns_cancelled_without_blocking_forever() {
        use compass_test_support::test_hypothesis;

        let token = CancellationToken::new();
        let interface = ConsoleDecisionInterface::new(token.clone());
        let investigation = test_investigation(10.0);
        let hyp = test_hypothesis("agent", "some cause", 0.5);

        token.cancel();
        let result = interface.decide(&[hyp], &investigation).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
