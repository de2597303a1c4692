//! Wires the observation coordinator, hypothesis ranker, human decision
//! interface, and disproof engine into one Observe-Orient-Decide-Act loop
//! per investigation.

pub mod coordinator;
pub mod decision;
pub mod ooda;
pub mod ranker;

pub use coordinator::{CoordinationResult, CoordinatorConfig, ObservationCoordinator, WorkerOutcome};
pub use decision::ConsoleDecisionInterface;
pub use ooda::{OodaConfig, OodaOrchestrator, OodaOutcome};
pub use ranker::{HypothesisRanker, RankedHypothesis, RankerConfig, RankingResult};
