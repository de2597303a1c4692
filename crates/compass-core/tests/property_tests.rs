use std::collections::HashMap;

use compass_core::{DisproofAttempt, Evidence, EvidenceQuality, Hypothesis, HypothesisStatus};
use proptest::prelude::*;

fn arb_quality() -> impl Strategy<Value = EvidenceQuality> {
    prop_oneof![
        Just(EvidenceQuality::Direct),
        Just(EvidenceQuality::Corroborated),
        Just(EvidenceQuality::Indirect),
        Just(EvidenceQuality::Circumstantial),
        Just(EvidenceQuality::Weak),
    ]
}

fn arb_evidence() -> impl Strategy<Value = (EvidenceQuality, bool, f64)> {
    (arb_quality(), any::<bool>(), 0.0f64..=1.0f64)
}

proptest! {
    /// P1: for every Hypothesis after any mutation, 0 <= current_confidence <= 1.
    #[test]
    fn p1_confidence_stays_in_bounds(
        initial in 0.0f64..=1.0f64,
        evidences in prop::collection::vec(arb_evidence(), 0..20),
        disproofs in prop::collection::vec(any::<bool>(), 0..10),
    ) {
        let mut h = Hypothesis::new("worker", "statement", initial, vec![], HashMap::new());
        for (quality, supports, confidence) in evidences {
            h.add_evidence(Evidence::new("src", serde_json::json!({}), "interp", quality, supports, confidence));
            prop_assert!((0.0..=1.0).contains(&h.current_confidence));
        }
        for disproven in disproofs {
            h.add_disproof_attempt(DisproofAttempt::new(
                "strategy", "method", "expected", "observed", disproven, vec![], "reasoning", HashMap::new(),
            ));
            prop_assert!((0.0..=1.0).contains(&h.current_confidence));
            if disproven {
                prop_assert_eq!(h.current_confidence, 0.0);
                prop_assert_eq!(h.status, HypothesisStatus::Disproven);
            }
        }
    }

    /// P5: the audit log rendering preserves identity, statement, confidence,
    /// and evidence/attempt counts.
    #[test]
    fn p5_audit_log_preserves_logical_values(
        initial in 0.0f64..=1.0f64,
        evidences in prop::collection::vec(arb_evidence(), 0..8),
    ) {
        let mut h = Hypothesis::new("worker", "a statement", initial, vec![], HashMap::new());
        for (quality, supports, confidence) in &evidences {
            h.add_evidence(Evidence::new("src", serde_json::json!({}), "interp", *quality, *supports, *confidence));
        }
        let log = h.to_audit_log();
        prop_assert_eq!(log["id"].as_str().unwrap(), h.id.to_string());
        prop_assert_eq!(log["statement"].as_str().unwrap(), h.statement.clone());
        prop_assert_eq!(log["confidence"]["current"].as_f64().unwrap(), h.current_confidence);
        let supporting_count = log["evidence"]["supporting"].as_array().unwrap().len();
        let contradicting_count = log["evidence"]["contradicting"].as_array().unwrap().len();
        prop_assert_eq!(supporting_count, h.supporting_evidence.len());
        prop_assert_eq!(contradicting_count, h.contradicting_evidence.len());
    }
}
