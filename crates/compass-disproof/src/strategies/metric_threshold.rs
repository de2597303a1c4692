use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use compass_core::{DisproofAttempt, Evidence, EvidenceQuality, Hypothesis, MetricBackend};

use crate::engine::DisproofStrategy;

const HIGH_EVIDENCE_CONFIDENCE: f64 = 0.9;
const THRESHOLD_TOLERANCE: f64 = 0.05;

struct MetricClaim {
    threshold: f64,
    operator: String,
    description: Option<String>,
}

fn parse_claim(name: &str, value: &serde_json::Value) -> Option<MetricClaim> {
    let obj = value.as_object()?;
    let threshold = obj.get("threshold")?.as_f64()?;
    let operator = obj.get("operator")?.as_str().unwrap_or(">=").to_string();
    let description = obj
        .get("description")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let _ = name;
    Some(MetricClaim {
        threshold,
        operator,
        description,
    })
}

/// Evaluates an operator with the fixed threshold tolerance. Unsupported
/// operator tokens fall back to `>=` rather than erroring.
fn evaluate(operator: &str, value: f64, threshold: f64) -> bool {
    match operator {
        ">=" | "≥" => value >= threshold - THRESHOLD_TOLERANCE,
        "<=" | "≤" => value <= threshold + THRESHOLD_TOLERANCE,
        ">" => value > threshold - THRESHOLD_TOLERANCE,
        "<" => value < threshold + THRESHOLD_TOLERANCE,
        "=" | "==" => (value - threshold).abs() <= THRESHOLD_TOLERANCE,
        "!=" | "≠" => (value - threshold).abs() > THRESHOLD_TOLERANCE,
        other => {
            tracing::warn!(operator = %other, "metric_threshold_validation.unsupported_operator, defaulting to >=");
            value >= threshold - THRESHOLD_TOLERANCE
        }
    }
}

/// Falsifies a hypothesis that quantifies one or more metrics
/// (`metric_claims` metadata) by comparing each against its live value.
pub struct MetricThresholdValidationStrategy {
    prometheus: Arc<dyn MetricBackend>,
}

impl MetricThresholdValidationStrategy {
    pub fn new(prometheus: Arc<dyn MetricBackend>) -> Self {
        Self { prometheus }
    }

    fn inconclusive(&self, reasoning: impl Into<String>) -> DisproofAttempt {
        DisproofAttempt::new(
            self.name(),
            "metric threshold validation via live query",
            "n/a",
            "n/a",
            false,
            vec![],
            reasoning,
            HashMap::new(),
        )
    }
}

#[async_trait]
impl DisproofStrategy for MetricThresholdValidationStrategy {
    fn name(&self) -> &str {
        "metric_threshold_validation"
    }

    async fn attempt_disproof(&self, hypothesis: &Hypothesis) -> DisproofAttempt {
        let Some(claims_obj) = hypothesis
            .metadata
            .get("metric_claims")
            .and_then(|v| v.as_object())
        else {
            return self.inconclusive("no metric_claims in hypothesis metadata");
        };

        if claims_obj.is_empty() {
            return self.inconclusive("metric_claims metadata is empty");
        }

        let mut failed_evidence = Vec::new();
        let mut passed_evidence = Vec::new();
        let mut failure_descriptions = Vec::new();

        for (metric_name, raw_claim) in claims_obj {
            let Some(claim) = parse_claim(metric_name, raw_claim) else {
                failure_descriptions.push(format!("{metric_name}: malformed claim"));
                continue;
            };

            let samples = match self.prometheus.query(metric_name, None).await {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(metric = %metric_name, error = %e, "metric_threshold_validation.backend_error");
                    continue;
                }
            };

            let Some(value) = samples.first().map(|s| s.value) else {
                continue;
            };

            let passes = evaluate(&claim.operator, value, claim.threshold);
            let description = claim
                .description
                .clone()
                .unwrap_or_else(|| format!("{metric_name} {} {}", claim.operator, claim.threshold));

            if passes {
                passed_evidence.push(Evidence::new(
                    "prometheus:query",
                    serde_json::json!({"metric": metric_name, "value": value, "threshold": claim.threshold}),
                    format!("{description}: observed {value} satisfies claim"),
                    EvidenceQuality::Direct,
                    true,
                    HIGH_EVIDENCE_CONFIDENCE,
                ));
            } else {
                failure_descriptions.push(format!(
                    "{description}: observed {value}, expected {} {}",
                    claim.operator, claim.threshold
                ));
                failed_evidence.push(Evidence::new(
                    "prometheus:query",
                    serde_json::json!({"metric": metric_name, "value": value, "threshold": claim.threshold}),
                    format!("{description}: observed {value} violates claim"),
                    EvidenceQuality::Direct,
                    false,
                    HIGH_EVIDENCE_CONFIDENCE,
                ));
            }
        }

        if !failed_evidence.is_empty() {
            let reasoning = format!(
                "metric claim(s) disproven: {}",
                failure_descriptions.join("; ")
            );
            return DisproofAttempt::new(
                self.name(),
                "metric threshold validation via live query",
                "all metric claims hold within tolerance",
                failure_descriptions.join("; "),
                true,
                failed_evidence,
                reasoning,
                HashMap::new(),
            );
        }

        if !passed_evidence.is_empty() {
            return DisproofAttempt::new(
                self.name(),
                "metric threshold validation via live query",
                "all metric claims hold within tolerance",
                "all claims satisfied",
                false,
                passed_evidence,
                "all metric claims validated against live values",
                HashMap::new(),
            );
        }

        self.inconclusive("no metric samples were available for any claimed metric")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_test_support::MockMetricBackend;
    use std::collections::HashMap as Map;

    fn hyp_with_claims(claims: serde_json::Value) -> Hypothesis {
        let mut metadata = Map::new();
        metadata.insert("metric_claims".to_string(), claims);
        Hypothesis::new("db-agent", "pool utilization is critical", 0.8, vec![], metadata)
    }

    #[tokio::test]
    async fn disproven_when_metric_below_threshold() {
        // Scenario 3: pool_util >= 0.95 claimed, backend reports 0.45.
        let backend = Arc::new(MockMetricBackend::with_value(0.45));
        let strategy = MetricThresholdValidationStrategy::new(backend);
        let h = hyp_with_claims(serde_json::json!({
            "pool_util": {"threshold": 0.95, "operator": ">="}
        }));

        let attempt = strategy.attempt_disproof(&h).await;
        assert!(attempt.disproven);
        assert!(attempt.reasoning.contains("0.45"));
    }

    #[tokio::test]
    async fn survives_when_all_claims_pass() {
        let backend = Arc::new(MockMetricBackend::with_value(0.97));
        let strategy = MetricThresholdValidationStrategy::new(backend);
        let h = hyp_with_claims(serde_json::json!({
            "pool_util": {"threshold": 0.95, "operator": ">="}
        }));

        let attempt = strategy.attempt_disproof(&h).await;
        assert!(!attempt.disproven);
        assert!(!attempt.evidence.is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_is_inconclusive() {
        let backend = Arc::new(MockMetricBackend::empty());
        let strategy = MetricThresholdValidationStrategy::new(backend);
        let h = Hypothesis::new("db-agent", "x", 0.5, vec![], Map::new());
        let attempt = strategy.attempt_disproof(&h).await;
        assert!(!attempt.disproven);
        assert!(attempt.evidence.is_empty());
    }
}
