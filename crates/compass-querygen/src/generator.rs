use std::collections::HashMap;
use std::sync::Arc;

use compass_core::{Llm, QueryType};
use parking_lot::Mutex;
use thiserror::Error;

use crate::validation::validate_query;

/// Estimated cost per query when no cost history is available yet.
pub const DEFAULT_ESTIMATED_COST_PER_QUERY: f64 = 0.0020;

#[derive(Debug, Error)]
pub enum QueryGenerationError {
    #[error("budget exceeded: ${estimated_total:.4} > ${budget_limit:.4}")]
    BudgetExceeded {
        estimated_total: f64,
        budget_limit: f64,
    },
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("template '{template}' missing required parameter '{parameter}'")]
    MissingTemplateParameter { template: String, parameter: String },
    #[error("LLM query generation failed: {0}")]
    LlmFailure(String),
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub query_type: QueryType,
    pub intent: String,
    pub context: serde_json::Value,
    pub use_template: Option<String>,
}

impl QueryRequest {
    pub fn new(query_type: QueryType, intent: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            query_type,
            intent: intent.into(),
            context,
            use_template: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.use_template = Some(template.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub query_type: QueryType,
    pub query: String,
    pub explanation: String,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
    pub tokens_used: u32,
    pub cost: f64,
    pub used_template: bool,
    pub from_cache: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

struct Template {
    template: String,
    #[allow(dead_code)]
    parameters: Vec<String>,
}

struct Totals {
    total_queries: u64,
    total_tokens: u64,
    total_cost: f64,
    non_cached_queries: u64,
}

#[derive(Debug, Clone)]
pub struct CostStats {
    pub total_queries: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub average_tokens_per_query: f64,
    pub cache_size: usize,
    pub template_count: usize,
}

/// Generates PromQL/LogQL/TraceQL queries from a natural-language intent,
/// replacing hardcoded queries in disproof strategies so the engine can ask
/// whatever question it needs.
///
/// Caching and budget tracking are local to one instance; the orchestrator
/// creates one instance per investigation (spec §9: no global state here).
pub struct QueryGenerator {
    llm: Arc<dyn Llm>,
    budget_limit: Option<f64>,
    enable_cache: bool,
    totals: Mutex<Totals>,
    cache: Mutex<HashMap<String, GeneratedQuery>>,
    templates: Mutex<HashMap<String, Template>>,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn Llm>, budget_limit: Option<f64>, enable_cache: bool) -> Self {
        tracing::info!(
            budget_limit = ?budget_limit,
            enable_cache,
            "query_generator_initialized"
        );
        Self {
            llm,
            budget_limit,
            enable_cache,
            totals: Mutex::new(Totals {
                total_queries: 0,
                total_tokens: 0,
                total_cost: 0.0,
                non_cached_queries: 0,
            }),
            cache: Mutex::new(HashMap::new()),
            templates: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_template(&self, name: impl Into<String>, template: impl Into<String>, parameters: Vec<String>) {
        let name = name.into();
        self.templates.lock().insert(
            name.clone(),
            Template {
                template: template.into(),
                parameters: parameters.clone(),
            },
        );
        tracing::info!(name = %name, ?parameters, "template_registered");
    }

    fn cache_key(request: &QueryRequest) -> String {
        let type_tag = match request.query_type {
            QueryType::Promql => "promql",
            QueryType::Logql => "logql",
            QueryType::Traceql => "traceql",
        };
        let data = format!("{type_tag}:{}:{}", request.intent, request.context);
        format!("{:x}", md5::compute(data.as_bytes()))
    }

    fn check_budget(&self) -> Result<(), QueryGenerationError> {
        let Some(budget_limit) = self.budget_limit else {
            return Ok(());
        };
        let totals = self.totals.lock();
        let avg_cost = if totals.non_cached_queries > 0 {
            totals.total_cost / totals.non_cached_queries as f64
        } else {
            DEFAULT_ESTIMATED_COST_PER_QUERY
        };
        let estimated_total = totals.total_cost + avg_cost;
        if estimated_total > budget_limit {
            return Err(QueryGenerationError::BudgetExceeded {
                estimated_total,
                budget_limit,
            });
        }
        Ok(())
    }

    /// Generates a query: budget pre-check, then template path, then cache
    /// path, then LLM path.
    pub async fn generate_query(
        &self,
        request: QueryRequest,
    ) -> Result<GeneratedQuery, QueryGenerationError> {
        tracing::info!(
            query_type = ?request.query_type,
            intent = %request.intent,
            use_template = ?request.use_template,
            "generating_query"
        );

        self.check_budget()?;

        if let Some(template_name) = request.use_template.clone() {
            return self.generate_from_template(&template_name, &request);
        }

        if self.enable_cache {
            if let Some(cached) = self.get_from_cache(&request) {
                let mut totals = self.totals.lock();
                totals.total_queries += 1;
                totals.total_tokens += cached.tokens_used as u64;
                totals.total_cost += cached.cost;
                tracing::info!(query_type = ?request.query_type, "query_cache_hit");
                return Ok(cached);
            }
        }

        let result = self.generate_with_llm(&request).await?;

        if self.enable_cache {
            self.cache.lock().insert(Self::cache_key(&request), result.clone());
        }

        {
            let mut totals = self.totals.lock();
            totals.total_queries += 1;
            totals.non_cached_queries += 1;
            totals.total_tokens += result.tokens_used as u64;
            totals.total_cost += result.cost;
        }

        tracing::info!(
            query_type = ?request.query_type,
            tokens_used = result.tokens_used,
            cost = result.cost,
            is_valid = result.is_valid,
            "query_generated"
        );

        Ok(result)
    }

    async fn generate_with_llm(
        &self,
        request: &QueryRequest,
    ) -> Result<GeneratedQuery, QueryGenerationError> {
        let response = self
            .llm
            .generate(request.query_type, &request.intent, &request.context)
            .await
            .map_err(|e| QueryGenerationError::LlmFailure(e.to_string()))?;

        let validation_errors = validate_query(request.query_type, &response.query);
        Ok(GeneratedQuery {
            query_type: request.query_type,
            query: response.query,
            explanation: response.explanation,
            is_valid: validation_errors.is_empty(),
            validation_errors,
            tokens_used: response.tokens_used,
            cost: response.cost,
            used_template: false,
            from_cache: false,
            timestamp: chrono::Utc::now(),
        })
    }

    fn generate_from_template(
        &self,
        template_name: &str,
        request: &QueryRequest,
    ) -> Result<GeneratedQuery, QueryGenerationError> {
        let templates = self.templates.lock();
        let template = templates
            .get(template_name)
            .ok_or_else(|| QueryGenerationError::UnknownTemplate(template_name.to_string()))?;

        let query = render_template(&template.template, &request.context)?;
        let validation_errors = validate_query(request.query_type, &query);

        tracing::info!(template = %template_name, is_valid = validation_errors.is_empty(), "query_from_template");

        Ok(GeneratedQuery {
            query_type: request.query_type,
            query,
            explanation: format!("Generated from template: {template_name}"),
            is_valid: validation_errors.is_empty(),
            validation_errors,
            tokens_used: 0,
            cost: 0.0,
            used_template: true,
            from_cache: false,
            timestamp: chrono::Utc::now(),
        })
    }

    fn get_from_cache(&self, request: &QueryRequest) -> Option<GeneratedQuery> {
        let cache = self.cache.lock();
        let cached = cache.get(&Self::cache_key(request))?;
        let mut copy = cached.clone();
        copy.from_cache = true;
        copy.timestamp = chrono::Utc::now();
        Some(copy)
    }

    pub fn get_cost_stats(&self) -> CostStats {
        let totals = self.totals.lock();
        CostStats {
            total_queries: totals.total_queries,
            total_tokens: totals.total_tokens,
            total_cost: totals.total_cost,
            average_tokens_per_query: if totals.total_queries > 0 {
                totals.total_tokens as f64 / totals.total_queries as f64
            } else {
                0.0
            },
            cache_size: self.cache.lock().len(),
            template_count: self.templates.lock().len(),
        }
    }
}

/// Fills a `{param}`-style template from a JSON object context, mirroring
/// Python `str.format(**context)` semantics: `{{` and `}}` render as literal
/// braces, a single `{name}` looks `name` up in the context. Missing
/// parameters are an error rather than being left as literal placeholders.
fn render_template(
    template: &str,
    context: &serde_json::Value,
) -> Result<String, QueryGenerationError> {
    let chars: Vec<char> = template.chars().collect();
    let mut rendered = String::with_capacity(template.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                rendered.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                rendered.push('}');
                i += 2;
            }
            '{' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == '}')
                    .map(|offset| start + offset);
                let Some(end) = end else {
                    rendered.push('{');
                    i += 1;
                    continue;
                };
                let key: String = chars[start..end].iter().collect();
                let value = context.get(&key).ok_or_else(|| {
                    QueryGenerationError::MissingTemplateParameter {
                        template: template.to_string(),
                        parameter: key.clone(),
                    }
                })?;
                rendered.push_str(&value_to_plain_string(value));
                i = end + 1;
            }
            c => {
                rendered.push(c);
                i += 1;
            }
        }
    }
    Ok(rendered)
}

fn value_to_plain_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_test_support::MockLlm;

    #[tokio::test]
    async fn p7_second_identical_request_hits_cache() {
        // Scenario 6: same (PROMQL, "cpu check", {service: "x"}) issued twice.
        let llm = Arc::new(MockLlm::new("cpu_usage{service=\"x\"}", 42, 0.001));
        let generator = QueryGenerator::new(llm.clone(), None, true);

        let request = || QueryRequest::new(QueryType::Promql, "cpu check", serde_json::json!({"service": "x"}));

        let first = generator.generate_query(request()).await.unwrap();
        assert!(!first.from_cache);

        let second = generator.generate_query(request()).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(llm.call_count(), 1);

        let stats = generator.get_cost_stats();
        assert_eq!(stats.total_queries, 2);
        assert_eq!(stats.cache_size, 1);
    }

    #[tokio::test]
    async fn template_path_incurs_zero_cost() {
        let llm = Arc::new(MockLlm::new("unused", 0, 0.0));
        let generator = QueryGenerator::new(llm, None, true);
        generator.register_template(
            "metric_current_value",
            "{metric_name}{{service=\"{service}\"}}",
            vec!["metric_name".to_string(), "service".to_string()],
        );

        let request = QueryRequest::new(
            QueryType::Promql,
            "current value",
            serde_json::json!({"metric_name": "cpu_usage", "service": "payment"}),
        )
        .with_template("metric_current_value");

        let result = generator.generate_query(request).await.unwrap();
        assert!(result.used_template);
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.query, "cpu_usage{service=\"payment\"}");
    }

    #[tokio::test]
    async fn budget_precheck_rejects_when_estimate_exceeds_limit() {
        let llm = Arc::new(MockLlm::new("q", 10, 5.0));
        let generator = QueryGenerator::new(llm, Some(1.0), false);
        let request = QueryRequest::new(QueryType::Promql, "x", serde_json::json!({}));
        let result = generator.generate_query(request).await;
        assert!(matches!(result, Err(QueryGenerationError::BudgetExceeded { .. })));
    }
}
