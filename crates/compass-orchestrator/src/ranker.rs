use std::collections::HashSet;

use compass_core::Hypothesis;

const STOPWORDS: &[&str] = &[
    "the", "is", "are", "was", "were", "been", "being", "have", "has", "had", "a", "an",
];

/// Abbreviation expansions applied before tokenizing, so "db" and "database"
/// overlap in the similarity computation instead of being unrelated tokens.
const ABBREVIATIONS: &[(&str, &str)] = &[("db", "database"), ("conn", "connection")];

const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
const DEFAULT_MAX_HYPOTHESES: usize = 5;

#[derive(Debug, Clone)]
pub struct RankerConfig {
    pub similarity_threshold: f64,
    pub max_hypotheses: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_hypotheses: DEFAULT_MAX_HYPOTHESES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedHypothesis {
    pub hypothesis: Hypothesis,
    pub reasoning: String,
}

#[derive(Debug, Clone)]
pub struct RankingResult {
    pub ranked: Vec<RankedHypothesis>,
    pub deduplicated_count: usize,
    /// Human-readable conflict descriptions, one per detected conflicting
    /// pair, computed over the full deduplicated set before top-N
    /// truncation.
    pub conflicts: Vec<String>,
}

fn tokenize(statement: &str) -> HashSet<String> {
    statement
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(abbrev, _)| *abbrev == word)
                .map(|(_, expanded)| expanded.to_string())
                .unwrap_or_else(|| word.to_string())
        })
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Jaccard similarity between two token sets, with a subset shortcut: if one
/// set of tokens is entirely contained in the other, treat them as a perfect
/// match (e.g. "Pool exhausted" is a strict subset of "Database connection
/// pool exhausted").
fn similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.is_subset(b) || b.is_subset(a) {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Sorts by `initial_confidence` descending, collapses near-duplicate
/// statements, flags conflicting pairs, and truncates to the configured top
/// N. Ported from the orientation phase of the original investigation loop.
pub struct HypothesisRanker {
    config: RankerConfig,
}

impl HypothesisRanker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, hypotheses: Vec<Hypothesis>) -> RankingResult {
        if hypotheses.is_empty() {
            return RankingResult {
                ranked: Vec::new(),
                deduplicated_count: 0,
                conflicts: Vec::new(),
            };
        }

        let original_count = hypotheses.len();
        let mut sorted = hypotheses;
        sorted.sort_by(|a, b| {
            b.initial_confidence
                .partial_cmp(&a.initial_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let tokens: Vec<HashSet<String>> = sorted.iter().map(|h| tokenize(&h.statement)).collect();

        let mut kept_indices = Vec::new();
        let mut deduplicated_count = 0usize;

        for (i, hyp) in sorted.iter().enumerate() {
            let is_duplicate = kept_indices.iter().any(|&kept_i: &usize| {
                similarity(&tokens[i], &tokens[kept_i]) >= self.config.similarity_threshold
            });
            if is_duplicate {
                deduplicated_count += 1;
                tracing::info!(
                    hypothesis_id = %hyp.id,
                    statement = %hyp.statement,
                    "ranker.deduplicated"
                );
                continue;
            }
            kept_indices.push(i);
        }

        let unique: Vec<&Hypothesis> = kept_indices.iter().map(|&i| &sorted[i]).collect();
        let conflicts = identify_conflicts(&unique);

        let mut ranked: Vec<RankedHypothesis> = unique
            .iter()
            .take(self.config.max_hypotheses)
            .enumerate()
            .map(|(idx, hyp)| {
                let reasoning = format!(
                    "Ranked #{} of {original_count} by initial confidence {:.0}%",
                    idx + 1,
                    hyp.initial_confidence * 100.0,
                );
                RankedHypothesis {
                    hypothesis: (*hyp).clone(),
                    reasoning,
                }
            })
            .collect();
        ranked.truncate(self.config.max_hypotheses);

        tracing::info!(
            kept = ranked.len(),
            deduplicated_count,
            conflict_count = conflicts.len(),
            "ranker.round_completed"
        );

        RankingResult {
            ranked,
            deduplicated_count,
            conflicts,
        }
    }
}

/// For each hypothesis carrying a `conflicts_with` metadata list of text
/// patterns, checks every later hypothesis's statement for keyword overlap
/// with any pattern. One conflict message per pair, at most.
fn identify_conflicts(hypotheses: &[&Hypothesis]) -> Vec<String> {
    let mut conflicts = Vec::new();

    for (i, hyp1) in hypotheses.iter().enumerate() {
        let Some(patterns) = hyp1
            .metadata
            .get("conflicts_with")
            .and_then(|v| v.as_array())
        else {
            continue;
        };
        if patterns.is_empty() {
            continue;
        }

        for hyp2 in &hypotheses[i + 1..] {
            let statement_words = tokenize(&hyp2.statement);
            if statement_words.is_empty() {
                continue;
            }

            let conflicted = patterns.iter().filter_map(|p| p.as_str()).any(|pattern| {
                let pattern_words = tokenize(pattern);
                !pattern_words.is_empty() && !pattern_words.is_disjoint(&statement_words)
            });

            if conflicted {
                conflicts.push(format!(
                    "Conflict: '{}' vs '{}' (confidence: {:.2} vs {:.2})",
                    hyp1.statement, hyp2.statement, hyp1.initial_confidence, hyp2.initial_confidence
                ));
                tracing::warn!(
                    hypothesis1 = %hyp1.statement,
                    hypothesis2 = %hyp2.statement,
                    "ranker.conflict_detected"
                );
            }
        }
    }

    conflicts
}
