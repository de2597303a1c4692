use compass_core::QueryType;
use regex::Regex;
use std::sync::OnceLock;

fn metric_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z_:][a-zA-Z0-9_:]*").expect("static regex"))
}

fn brace_selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^}]+\}").expect("static regex"))
}

/// Syntactic (not semantic) validation of a generated query string.
pub fn validate_query(query_type: QueryType, query: &str) -> Vec<String> {
    let mut errors = Vec::new();

    match query_type {
        QueryType::Promql => {
            let stripped = query.trim();
            if stripped.starts_with('{') {
                errors.push("PromQL query missing metric name (cannot start with '{')".to_string());
            } else if !metric_identifier_re().is_match(query) {
                errors.push("PromQL query missing metric name or function".to_string());
            }

            if count_char(query, '{') != count_char(query, '}') {
                errors.push("Unbalanced curly braces in PromQL query".to_string());
            }
            if count_char(query, '[') != count_char(query, ']') {
                errors.push("Unbalanced square brackets in PromQL query".to_string());
            }
            if count_char(query, '(') != count_char(query, ')') {
                errors.push("Unbalanced parentheses in PromQL query".to_string());
            }
        }
        QueryType::Logql => {
            if !brace_selector_re().is_match(query) {
                errors.push("LogQL query missing log stream selector".to_string());
            }
        }
        QueryType::Traceql => {
            if !brace_selector_re().is_match(query) {
                errors.push("TraceQL query missing span selector".to_string());
            }
        }
    }

    errors
}

fn count_char(s: &str, c: char) -> usize {
    s.chars().filter(|ch| *ch == c).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promql_rejects_leading_brace() {
        let errors = validate_query(QueryType::Promql, "{service=\"test\"}");
        assert!(!errors.is_empty());
    }

    #[test]
    fn promql_accepts_metric_with_selector() {
        let errors = validate_query(QueryType::Promql, "rate(cpu_usage{service=\"x\"}[5m])");
        assert!(errors.is_empty());
    }

    #[test]
    fn promql_flags_unbalanced_braces() {
        let errors = validate_query(QueryType::Promql, "cpu_usage{service=\"x\"");
        assert!(errors.iter().any(|e| e.contains("curly")));
    }

    #[test]
    fn logql_requires_stream_selector() {
        let errors = validate_query(QueryType::Logql, "count_over_time(...)");
        assert!(!errors.is_empty());
        let errors = validate_query(QueryType::Logql, "{service=\"x\"} |= \"error\"");
        assert!(errors.is_empty());
    }

    #[test]
    fn traceql_requires_span_selector() {
        let errors = validate_query(QueryType::Traceql, "duration > 500ms");
        assert!(!errors.is_empty());
        let errors = validate_query(QueryType::Traceql, "{duration > 500ms}");
        assert!(errors.is_empty());
    }
}
