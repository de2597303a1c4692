//! Hand-rolled mock ports and fixture builders shared across the workspace's
//! test suites. No `mockall` here: the retrieval pack this workspace was
//! grounded on declares `mockall` in its workspace manifest but never
//! actually uses it, so hand-rolled structs are the more faithful choice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use compass_core::{
    CoreError, DecisionInput, DecisionInterface, Hypothesis, Investigation, InvestigationContext,
    Llm, LlmQueryResponse, LogBackend, LogEntry, MetricBackend, MetricSample, Observation,
    QueryType, TimeRange, TraceBackend, TraceSummary, Worker,
};
use parking_lot::Mutex;

/// Builds an [`InvestigationContext`] with sane defaults, overridable per
/// field, matching the "api-backend / 500 errors spiking / high" shape used
/// throughout the original test suite.
pub fn test_context() -> InvestigationContext {
    InvestigationContext {
        service: "api-backend".to_string(),
        symptom: "500 errors spiking".to_string(),
        severity: "high".to_string(),
        metadata: HashMap::new(),
    }
}

pub fn test_investigation(budget_limit: f64) -> Investigation {
    Investigation::create(test_context(), budget_limit)
}

pub fn test_hypothesis(agent_id: &str, statement: &str, initial_confidence: f64) -> Hypothesis {
    Hypothesis::new(agent_id, statement, initial_confidence, vec![], HashMap::new())
}

/// A worker whose `observe`/`generate_hypothesis` results are fixed at
/// construction time, for driving deterministic coordinator tests.
pub struct MockWorker {
    id: String,
    observe_result: Mutex<Option<Result<Observation, CoreError>>>,
    hypotheses: Mutex<Vec<Hypothesis>>,
    observe_calls: AtomicUsize,
    delay: Mutex<Option<std::time::Duration>>,
}

impl MockWorker {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            observe_result: Mutex::new(Some(Ok(Observation {
                worker_id: id.clone(),
                data: serde_json::json!({}),
                confidence: 0.5,
                reported_cost: 0.0,
            }))),
            id,
            hypotheses: Mutex::new(Vec::new()),
            observe_calls: AtomicUsize::new(0),
            delay: Mutex::new(None),
        }
    }

    pub fn failing(id: impl Into<String>, error: CoreError) -> Self {
        let w = Self::new(id);
        *w.observe_result.lock() = Some(Err(error));
        w
    }

    pub fn with_hypotheses(self, hypotheses: Vec<Hypothesis>) -> Self {
        *self.hypotheses.lock() = hypotheses;
        self
    }

    pub fn with_confidence(self, confidence: f64) -> Self {
        if let Some(Ok(obs)) = self.observe_result.lock().as_mut() {
            obs.confidence = confidence;
        }
        self
    }

    pub fn with_reported_cost(self, cost: f64) -> Self {
        if let Some(Ok(obs)) = self.observe_result.lock().as_mut() {
            obs.reported_cost = cost;
        }
        self
    }

    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn observe_call_count(&self) -> usize {
        self.observe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for MockWorker {
    fn id(&self) -> &str {
        &self.id
    }

    async fn observe(&self, _investigation: &Investigation) -> Result<Observation, CoreError> {
        self.observe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.delay.lock() {
            tokio::time::sleep(delay).await;
        }
        match self.observe_result.lock().take() {
            Some(result) => result,
            None => Err(CoreError::Transport {
                backend: self.id.clone(),
                message: "observe called more than once on a single-shot mock".to_string(),
            }),
        }
    }

    async fn generate_hypothesis(
        &self,
        _observation: &Observation,
        _investigation: &Investigation,
    ) -> Result<Vec<Hypothesis>, CoreError> {
        Ok(self.hypotheses.lock().clone())
    }
}

/// A metric backend returning a fixed set of samples (or erroring).
pub struct MockMetricBackend {
    result: Mutex<Result<Vec<MetricSample>, String>>,
}

impl MockMetricBackend {
    pub fn with_samples(samples: Vec<MetricSample>) -> Self {
        Self {
            result: Mutex::new(Ok(samples)),
        }
    }

    pub fn with_value(value: f64) -> Self {
        Self::with_samples(vec![MetricSample {
            metric_labels: HashMap::new(),
            value,
            timestamp: chrono::Utc::now(),
        }])
    }

    pub fn empty() -> Self {
        Self::with_samples(vec![])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Mutex::new(Err(message.into())),
        }
    }
}

#[async_trait]
impl MetricBackend for MockMetricBackend {
    async fn query(
        &self,
        _expr: &str,
        _time_range: Option<TimeRange>,
    ) -> Result<Vec<MetricSample>, CoreError> {
        self.result
            .lock()
            .clone()
            .map_err(|message| CoreError::Transport {
                backend: "metric".to_string(),
                message,
            })
    }
}

/// A log backend returning a fixed set of entries.
pub struct MockLogBackend {
    entries: Vec<LogEntry>,
}

impl MockLogBackend {
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl LogBackend for MockLogBackend {
    async fn query_range(
        &self,
        _expr: &str,
        _start: chrono::DateTime<chrono::Utc>,
        _end: chrono::DateTime<chrono::Utc>,
        _limit: usize,
    ) -> Result<Vec<LogEntry>, CoreError> {
        Ok(self.entries.clone())
    }
}

/// A trace backend returning a fixed set of trace summaries, used to drive
/// Scope Verification tests (`with_affected_services` fabricates one trace
/// per named service).
pub struct MockTraceBackend {
    traces: Vec<TraceSummary>,
}

impl MockTraceBackend {
    pub fn with_traces(traces: Vec<TraceSummary>) -> Self {
        Self { traces }
    }

    pub fn with_affected_services(services: &[&str]) -> Self {
        Self::with_traces(
            services
                .iter()
                .map(|s| TraceSummary {
                    trace_id: uuid::Uuid::new_v4().to_string(),
                    service: s.to_string(),
                    duration_ms: 0.0,
                    attributes: HashMap::new(),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl TraceBackend for MockTraceBackend {
    async fn query(
        &self,
        _expr: &str,
        _time_range: Option<TimeRange>,
        _limit: usize,
    ) -> Result<Vec<TraceSummary>, CoreError> {
        Ok(self.traces.clone())
    }
}

/// An LLM port that returns a fixed response and counts invocations, so
/// tests can assert the Query Generator cache prevented a second call.
pub struct MockLlm {
    response: LlmQueryResponse,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn new(query: impl Into<String>, tokens_used: u32, cost: f64) -> Self {
        Self {
            response: LlmQueryResponse {
                query: query.into(),
                explanation: "generated by mock".to_string(),
                tokens_used,
                cost,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Llm for MockLlm {
    async fn generate(
        &self,
        _query_type: QueryType,
        _intent: &str,
        _context: &serde_json::Value,
    ) -> Result<LlmQueryResponse, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// A decision interface that always selects a pre-chosen hypothesis id.
pub struct MockDecisionInterface {
    selected_id: Mutex<Option<uuid::Uuid>>,
    reasoning: String,
}

impl MockDecisionInterface {
    pub fn selecting(id: uuid::Uuid, reasoning: impl Into<String>) -> Self {
        Self {
            selected_id: Mutex::new(Some(id)),
            reasoning: reasoning.into(),
        }
    }

    pub fn selecting_first_ranked(reasoning: impl Into<String>) -> Self {
        Self {
            selected_id: Mutex::new(None),
            reasoning: reasoning.into(),
        }
    }
}

#[async_trait]
impl DecisionInterface for MockDecisionInterface {
    async fn decide(
        &self,
        ranked_hypotheses: &[Hypothesis],
        _investigation: &Investigation,
    ) -> Result<DecisionInput, CoreError> {
        if ranked_hypotheses.is_empty() {
            return Err(CoreError::Validation(
                "cannot decide over an empty ranked hypothesis list".to_string(),
            ));
        }
        let selected_id = match *self.selected_id.lock() {
            Some(id) => id,
            None => ranked_hypotheses[0].id,
        };
        Ok(DecisionInput {
            selected_hypothesis_id: selected_id,
            reasoning: self.reasoning.clone(),
            timestamp: chrono::Utc::now(),
        })
    }
}
