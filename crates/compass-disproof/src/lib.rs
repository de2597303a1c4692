//! Active falsification of a selected hypothesis: the engine that runs a
//! named strategy suite, and the three first-class strategies (temporal
//! contradiction, scope verification, metric threshold validation).

pub mod engine;
pub mod strategies;

pub use engine::{DisproofEngine, DisproofOutcome, DisproofStrategy, ValidationResult};
pub use strategies::{
    MetricThresholdValidationStrategy, ScopeVerificationStrategy, TemporalContradictionStrategy,
};
