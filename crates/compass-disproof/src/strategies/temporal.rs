use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use compass_core::{DisproofAttempt, Evidence, EvidenceQuality, Hypothesis, MetricBackend, TimeRange};

use crate::engine::DisproofStrategy;

const HIGH_EVIDENCE_CONFIDENCE: f64 = 0.9;
/// Samples within this margin of the suspected time are treated as
/// ambiguous rather than contradictory, so clock skew and polling jitter
/// don't manufacture a false disproof.
const TEMPORAL_EPSILON: Duration = Duration::seconds(60);
/// How far back before the suspected time to search for a pre-existing
/// symptom.
const LOOKBACK_WINDOW: Duration = Duration::minutes(30);

fn direction_holds(direction: &str, value: f64, threshold: f64) -> bool {
    match direction {
        "<=" | "≤" => value <= threshold,
        _ => value >= threshold,
    }
}

/// Falsifies a hypothesis claiming an event at time T caused the symptom,
/// by showing the symptom's metric already crossed its threshold before T.
pub struct TemporalContradictionStrategy {
    metrics: Arc<dyn MetricBackend>,
}

impl TemporalContradictionStrategy {
    pub fn new(metrics: Arc<dyn MetricBackend>) -> Self {
        Self { metrics }
    }

    fn inconclusive(&self, reasoning: impl Into<String>) -> DisproofAttempt {
        DisproofAttempt::new(
            self.name(),
            "temporal contradiction via metric history",
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
impl DisproofStrategy for TemporalContradictionStrategy {
    fn name(&self) -> &str {
        "temporal_contradiction"
    }

    async fn attempt_disproof(&self, hypothesis: &Hypothesis) -> DisproofAttempt {
        let Some(suspected_time_str) = hypothesis
            .metadata
            .get("suspected_time")
            .and_then(|v| v.as_str())
        else {
            return self.inconclusive("no suspected_time in hypothesis metadata");
        };

        let Ok(suspected_time) = DateTime::parse_from_rfc3339(suspected_time_str)
            .map(|dt| dt.with_timezone(&Utc))
        else {
            return self.inconclusive(format!(
                "suspected_time '{suspected_time_str}' is not valid ISO-8601"
            ));
        };

        let Some(metric_name) = hypothesis.metadata.get("metric_name").and_then(|v| v.as_str())
        else {
            return self.inconclusive("no metric_name in hypothesis metadata");
        };

        let Some(threshold) = hypothesis.metadata.get("threshold").and_then(|v| v.as_f64()) else {
            return self.inconclusive("no threshold in hypothesis metadata");
        };

        let direction = hypothesis
            .metadata
            .get("direction")
            .and_then(|v| v.as_str())
            .unwrap_or(">=")
            .to_string();

        let window = TimeRange {
            start: Some(suspected_time - LOOKBACK_WINDOW),
            end: Some(suspected_time),
        };

        let samples = match self.metrics.query(metric_name, Some(window)).await {
            Ok(samples) => samples,
            Err(e) => return self.inconclusive(format!("metric backend error: {e}")),
        };

        if samples.is_empty() {
            return self.inconclusive(format!(
                "no samples for '{metric_name}' in the lookback window before {suspected_time}"
            ));
        }

        let cutoff = suspected_time - TEMPORAL_EPSILON;
        let pre_existing = samples
            .iter()
            .filter(|s| s.timestamp < cutoff && direction_holds(&direction, s.value, threshold))
            .min_by_key(|s| s.timestamp);

        if let Some(sample) = pre_existing {
            let evidence = Evidence::new(
                "prometheus:query",
                serde_json::json!({
                    "metric": metric_name,
                    "value": sample.value,
                    "timestamp": sample.timestamp.to_rfc3339(),
                    "suspected_time": suspected_time.to_rfc3339(),
                }),
                format!(
                    "{metric_name} already {direction} {threshold} at {}, before the suspected cause at {suspected_time}",
                    sample.timestamp
                ),
                EvidenceQuality::Direct,
                false,
                HIGH_EVIDENCE_CONFIDENCE,
            );
            return DisproofAttempt::new(
                self.name(),
                "temporal contradiction via metric history",
                format!("symptom absent before {suspected_time}"),
                format!("{metric_name}={} at {}", sample.value, sample.timestamp),
                true,
                vec![evidence],
                format!(
                    "symptom predates the suspected cause: {metric_name} crossed threshold at {}, {:?} before {suspected_time}",
                    sample.timestamp,
                    suspected_time - sample.timestamp,
                ),
                HashMap::new(),
            );
        }

        self.inconclusive(format!(
            "no pre-existing {metric_name} samples crossing threshold before {suspected_time}; temporal ordering is consistent with the claim"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::MetricSample;
    use compass_test_support::MockMetricBackend;
    use std::collections::HashMap as Map;

    fn hyp_with_metadata(metadata: Map<String, serde_json::Value>) -> Hypothesis {
        Hypothesis::new("db-agent", "deploy at T caused the outage", 0.8, vec![], metadata)
    }

    #[tokio::test]
    async fn disproven_when_symptom_predates_suspected_time() {
        let suspected_time = Utc::now();
        let earlier_sample = MetricSample {
            metric_labels: Map::new(),
            value: 0.99,
            timestamp: suspected_time - Duration::minutes(10),
        };
        let backend = Arc::new(MockMetricBackend::with_samples(vec![earlier_sample]));
        let strategy = TemporalContradictionStrategy::new(backend);

        let mut metadata = Map::new();
        metadata.insert("suspected_time".to_string(), serde_json::json!(suspected_time.to_rfc3339()));
        metadata.insert("metric_name".to_string(), serde_json::json!("error_rate"));
        metadata.insert("threshold".to_string(), serde_json::json!(0.9));
        let h = hyp_with_metadata(metadata);

        let attempt = strategy.attempt_disproof(&h).await;
        assert!(attempt.disproven);
    }

    #[tokio::test]
    async fn missing_metadata_is_inconclusive() {
        let backend = Arc::new(MockMetricBackend::empty());
        let strategy = TemporalContradictionStrategy::new(backend);
        let h = hyp_with_metadata(Map::new());
        let attempt = strategy.attempt_disproof(&h).await;
        assert!(!attempt.disproven);
    }
}
