use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance strength of an [`Evidence`] record. Weights are fixed and used
/// directly in the confidence calculus — they are not configurable, since
/// the calculus depends on their exact values being stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceQuality {
    Direct,
    Corroborated,
    Indirect,
    Circumstantial,
    Weak,
}

impl EvidenceQuality {
    pub fn weight(self) -> f64 {
        match self {
            EvidenceQuality::Direct => 1.0,
            EvidenceQuality::Corroborated => 0.9,
            EvidenceQuality::Indirect => 0.6,
            EvidenceQuality::Circumstantial => 0.3,
            EvidenceQuality::Weak => 0.1,
        }
    }
}

/// An atomic observation with provenance. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub data: serde_json::Value,
    pub interpretation: String,
    pub quality: EvidenceQuality,
    pub supports_hypothesis: bool,
    pub confidence: f64,
}

const AUDIT_DATA_TRUNCATE_CHARS: usize = 200;

impl Evidence {
    pub fn new(
        source: impl Into<String>,
        data: serde_json::Value,
        interpretation: impl Into<String>,
        quality: EvidenceQuality,
        supports_hypothesis: bool,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            data,
            interpretation: interpretation.into(),
            quality,
            supports_hypothesis,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Serializable snapshot for the audit log, with `data` rendered as a
    /// string and truncated to [`AUDIT_DATA_TRUNCATE_CHARS`] characters.
    pub fn to_audit_log(&self) -> serde_json::Value {
        let data_str = self.data.to_string();
        let truncated: String = data_str.chars().take(AUDIT_DATA_TRUNCATE_CHARS).collect();
        serde_json::json!({
            "id": self.id.to_string(),
            "timestamp": self.timestamp.to_rfc3339(),
            "source": self.source,
            "data": truncated,
            "interpretation": self.interpretation,
            "quality": self.quality,
            "supports_hypothesis": self.supports_hypothesis,
            "confidence": self.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_match_spec() {
        assert_eq!(EvidenceQuality::Direct.weight(), 1.0);
        assert_eq!(EvidenceQuality::Corroborated.weight(), 0.9);
        assert_eq!(EvidenceQuality::Indirect.weight(), 0.6);
        assert_eq!(EvidenceQuality::Circumstantial.weight(), 0.3);
        assert_eq!(EvidenceQuality::Weak.weight(), 0.1);
    }

    #[test]
    fn audit_log_truncates_data() {
        let long = "x".repeat(500);
        let e = Evidence::new(
            "prometheus:cpu_p95",
            serde_json::json!(long),
            "cpu spiked",
            EvidenceQuality::Direct,
            true,
            0.8,
        );
        let log = e.to_audit_log();
        let data_field = log["data"].as_str().unwrap();
        assert!(data_field.len() <= AUDIT_DATA_TRUNCATE_CHARS + 2); // +2 for quotes stripped loosely
    }

    #[test]
    fn confidence_is_clamped() {
        let e = Evidence::new(
            "x",
            serde_json::json!(null),
            "y",
            EvidenceQuality::Weak,
            true,
            1.5,
        );
        assert_eq!(e.confidence, 1.0);
    }
}
