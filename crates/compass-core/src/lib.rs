//! Scientific framework and investigation state machine for automated
//! incident investigation: the data model (Evidence, DisproofAttempt,
//! Hypothesis) with its deterministic confidence calculus, the
//! Investigation state machine with budget enforcement, and the external
//! ports the rest of the workspace consumes.

pub mod disproof_attempt;
pub mod error;
pub mod evidence;
pub mod hypothesis;
pub mod investigation;
pub mod ports;

pub use disproof_attempt::DisproofAttempt;
pub use error::{CoreError, CoreResult};
pub use evidence::{Evidence, EvidenceQuality};
pub use hypothesis::{Hypothesis, HypothesisStatus};
pub use investigation::{
    HumanDecision, Investigation, InvestigationContext, InvestigationStatus,
    DEFAULT_BUDGET_LIMIT_USD,
};
pub use ports::{
    DecisionInput, DecisionInterface, Llm, LlmQueryResponse, LogBackend, LogEntry, MetricBackend,
    MetricSample, Observation, QueryType, TimeRange, TraceBackend, TraceSummary, Worker,
};
