use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::disproof_attempt::DisproofAttempt;
use crate::evidence::Evidence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Generated,
    Validating,
    Validated,
    Disproven,
    RequiresHuman,
    Confirmed,
    Rejected,
}

/// The central entity of an investigation: a testable, falsifiable
/// statement about a possible root cause.
///
/// `current_confidence`, `status`, and `confidence_reasoning` may only be
/// changed through [`Hypothesis::add_evidence`] and
/// [`Hypothesis::add_disproof_attempt`] — every other field is set at
/// construction and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub statement: String,
    pub status: HypothesisStatus,
    pub supporting_evidence: Vec<Evidence>,
    pub contradicting_evidence: Vec<Evidence>,
    pub disproof_attempts: Vec<DisproofAttempt>,
    pub initial_confidence: f64,
    pub current_confidence: f64,
    pub confidence_reasoning: String,
    pub affected_systems: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Hypothesis {
    pub fn new(
        agent_id: impl Into<String>,
        statement: impl Into<String>,
        initial_confidence: f64,
        affected_systems: Vec<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let initial_confidence = initial_confidence.clamp(0.0, 1.0);
        let mut h = Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            statement: statement.into(),
            status: HypothesisStatus::Generated,
            supporting_evidence: Vec::new(),
            contradicting_evidence: Vec::new(),
            disproof_attempts: Vec::new(),
            initial_confidence,
            current_confidence: initial_confidence,
            confidence_reasoning: String::new(),
            affected_systems,
            metadata,
        };
        h.update_confidence_reasoning();
        h
    }

    /// Appends `evidence` to the supporting or contradicting list per
    /// `supports_hypothesis`, then recomputes confidence.
    pub fn add_evidence(&mut self, evidence: Evidence) {
        if evidence.supports_hypothesis {
            self.supporting_evidence.push(evidence);
        } else {
            self.contradicting_evidence.push(evidence);
        }
        self.recalculate_confidence();
    }

    /// Appends `attempt`. If `attempt.disproven`, forces the hypothesis into
    /// the terminal DISPROVEN state with confidence zeroed; otherwise
    /// recomputes confidence using the survived-disproof bonus.
    pub fn add_disproof_attempt(&mut self, attempt: DisproofAttempt) {
        let strategy = attempt.strategy.clone();
        let reasoning = attempt.reasoning.clone();
        let disproven = attempt.disproven;
        self.disproof_attempts.push(attempt);

        if disproven {
            self.status = HypothesisStatus::Disproven;
            self.current_confidence = 0.0;
            self.confidence_reasoning =
                format!("Hypothesis disproven by {strategy}: {reasoning}");
        } else {
            self.recalculate_confidence();
        }
    }

    fn survived_disproof_count(&self) -> usize {
        self.disproof_attempts
            .iter()
            .filter(|a| !a.disproven)
            .count()
    }

    fn evidence_score(&self) -> f64 {
        let supporting: f64 = self
            .supporting_evidence
            .iter()
            .map(|e| e.confidence * e.quality.weight())
            .sum();
        let contradicting: f64 = self
            .contradicting_evidence
            .iter()
            .map(|e| e.confidence * e.quality.weight())
            .sum();
        let total_evidence_count = self.supporting_evidence.len() + self.contradicting_evidence.len();
        (supporting - contradicting) / (total_evidence_count.max(1) as f64)
    }

    fn recalculate_confidence(&mut self) {
        // A disproven hypothesis is terminal; nothing recomputes it back up.
        if self.status == HypothesisStatus::Disproven {
            return;
        }

        let evidence_score = self.evidence_score();
        let disproof_bonus = (0.05 * self.survived_disproof_count() as f64).min(0.3);
        let confidence = self.initial_confidence * 0.3 + evidence_score * 0.7 + disproof_bonus;
        self.current_confidence = confidence.clamp(0.0, 1.0);
        self.update_confidence_reasoning();
    }

    fn update_confidence_reasoning(&mut self) {
        let supporting = self.supporting_evidence.len();
        let contradicting = self.contradicting_evidence.len();
        let survived = self.survived_disproof_count();

        let mut parts = vec![format!(
            "initial confidence {:.0}%",
            self.initial_confidence * 100.0
        )];
        if supporting > 0 {
            parts.push(format!("{supporting} supporting evidence item(s)"));
        }
        if contradicting > 0 {
            parts.push(format!("{contradicting} contradicting evidence item(s)"));
        }
        if survived > 0 {
            parts.push(format!("survived {survived} disproof attempt(s)"));
        }

        self.confidence_reasoning = format!(
            "Current confidence {:.0}%: {}",
            self.current_confidence * 100.0,
            parts.join(", ")
        );
    }

    /// Serializable snapshot matching the audit log format of spec §6.
    pub fn to_audit_log(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "timestamp": self.timestamp.to_rfc3339(),
            "agent_id": self.agent_id,
            "statement": self.statement,
            "status": self.status,
            "confidence": {
                "initial": self.initial_confidence,
                "current": self.current_confidence,
                "reasoning": self.confidence_reasoning,
            },
            "evidence": {
                "supporting": self.supporting_evidence.iter().map(Evidence::to_audit_log).collect::<Vec<_>>(),
                "contradicting": self.contradicting_evidence.iter().map(Evidence::to_audit_log).collect::<Vec<_>>(),
            },
            "disproof_attempts": self.disproof_attempts.iter().map(DisproofAttempt::to_audit_log).collect::<Vec<_>>(),
            "affected_systems": self.affected_systems,
            "metadata": self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::EvidenceQuality;

    fn hyp(initial: f64) -> Hypothesis {
        Hypothesis::new("db-agent", "connection pool exhausted", initial, vec![], HashMap::new())
    }

    #[test]
    fn confidence_rises_then_caps_at_one() {
        // Scenario 1: initial=0.9, 10 DIRECT supporting evidence confidence=1.0,
        // then 10 surviving disproof attempts.
        let mut h = hyp(0.9);
        for _ in 0..10 {
            h.add_evidence(Evidence::new(
                "prometheus",
                serde_json::json!({}),
                "supports",
                EvidenceQuality::Direct,
                true,
                1.0,
            ));
        }
        for _ in 0..10 {
            h.add_disproof_attempt(DisproofAttempt::new(
                "temporal_contradiction",
                "check",
                "expected",
                "observed",
                false,
                vec![],
                "survived",
                HashMap::new(),
            ));
        }
        assert!((h.current_confidence - 1.0).abs() < 1e-9);
        assert_ne!(h.status, HypothesisStatus::Disproven);
    }

    #[test]
    fn disproof_zeroes_confidence_and_terminates() {
        // Scenario 2.
        let mut h = hyp(0.7);
        h.add_evidence(Evidence::new(
            "logs",
            serde_json::json!({}),
            "supports",
            EvidenceQuality::Direct,
            true,
            0.9,
        ));
        h.add_disproof_attempt(DisproofAttempt::new(
            "metric_threshold_validation",
            "check",
            "expected",
            "observed",
            true,
            vec![],
            "value out of range",
            HashMap::new(),
        ));
        assert_eq!(h.status, HypothesisStatus::Disproven);
        assert_eq!(h.current_confidence, 0.0);
        assert!(h.confidence_reasoning.contains("metric_threshold_validation"));
    }

    #[test]
    fn p1_confidence_always_in_bounds() {
        let mut h = hyp(0.5);
        for i in 0..5 {
            h.add_evidence(Evidence::new(
                "x",
                serde_json::json!({}),
                "y",
                EvidenceQuality::Weak,
                i % 2 == 0,
                0.3,
            ));
            assert!((0.0..=1.0).contains(&h.current_confidence));
        }
    }

    #[test]
    fn p2_disproven_attempt_forces_terminal_state() {
        let mut h = hyp(0.8);
        h.add_disproof_attempt(DisproofAttempt::new(
            "scope_verification",
            "m",
            "e",
            "o",
            true,
            vec![],
            "mismatch",
            HashMap::new(),
        ));
        assert_eq!(h.status, HypothesisStatus::Disproven);
        assert_eq!(h.current_confidence, 0.0);
    }

    #[test]
    fn audit_log_round_trips_identity_fields() {
        let h = hyp(0.6);
        let log = h.to_audit_log();
        assert_eq!(log["id"], h.id.to_string());
        assert_eq!(log["statement"], h.statement);
        assert_eq!(log["confidence"]["initial"], h.initial_confidence);
    }
}
