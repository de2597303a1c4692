pub mod metric_threshold;
pub mod scope;
pub mod temporal;

pub use metric_threshold::MetricThresholdValidationStrategy;
pub use scope::ScopeVerificationStrategy;
pub use temporal::TemporalContradictionStrategy;
