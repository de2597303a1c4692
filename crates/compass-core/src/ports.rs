//! External interfaces (ports) the core consumes but does not implement.
//!
//! Concrete transports (an HTTP Prometheus client, an OpenAI client, a
//! console prompt) live outside this crate; these traits are the seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::hypothesis::Hypothesis;
use crate::investigation::Investigation;

/// One sample returned by a [`MetricBackend`] query.
#[derive(Debug, Clone)]
pub struct MetricSample {
    pub metric_labels: std::collections::HashMap<String, String>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// A half-open time range, both ends optional per backend semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait MetricBackend: Send + Sync {
    async fn query(
        &self,
        expr: &str,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<MetricSample>, CoreError>;
}

/// One line returned by a [`LogBackend`] range query.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub stream: std::collections::HashMap<String, String>,
    pub time: DateTime<Utc>,
    pub line: String,
}

#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn query_range(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogEntry>, CoreError>;
}

/// A summarized trace matching a [`TraceBackend`] query.
#[derive(Debug, Clone)]
pub struct TraceSummary {
    pub trace_id: String,
    pub service: String,
    pub duration_ms: f64,
    pub attributes: std::collections::HashMap<String, String>,
}

#[async_trait]
pub trait TraceBackend: Send + Sync {
    async fn query(
        &self,
        expr: &str,
        time_range: Option<TimeRange>,
        limit: usize,
    ) -> Result<Vec<TraceSummary>, CoreError>;
}

/// The observation a worker contributes, plus its advisory confidence and
/// the cost it reports having incurred producing it.
#[derive(Debug, Clone)]
pub struct Observation {
    pub worker_id: String,
    pub data: serde_json::Value,
    pub confidence: f64,
    pub reported_cost: f64,
}

#[async_trait]
pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    async fn observe(&self, investigation: &Investigation) -> Result<Observation, CoreError>;

    async fn generate_hypothesis(
        &self,
        observation: &Observation,
        investigation: &Investigation,
    ) -> Result<Vec<Hypothesis>, CoreError>;
}

/// A query-language tag understood by the Query Generator and LLM port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Promql,
    Logql,
    Traceql,
}

/// The raw response an [`Llm`] port produces for one query-generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmQueryResponse {
    pub query: String,
    pub explanation: String,
    pub tokens_used: u32,
    pub cost: f64,
}

#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate(
        &self,
        query_type: QueryType,
        intent: &str,
        context: &serde_json::Value,
    ) -> Result<LlmQueryResponse, CoreError>;
}

/// A human decision returned by a [`DecisionInterface`]. The selected
/// hypothesis is identified by id so the orchestrator can look it up by
/// identity rather than receiving (and trusting) a copy.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    pub selected_hypothesis_id: uuid::Uuid,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait DecisionInterface: Send + Sync {
    /// Must reject an empty `ranked_hypotheses` with
    /// [`CoreError::Validation`] and must honor cancellation by returning
    /// [`CoreError::Cancelled`] rather than panicking.
    async fn decide(
        &self,
        ranked_hypotheses: &[Hypothesis],
        investigation: &Investigation,
    ) -> Result<DecisionInput, CoreError>;
}
