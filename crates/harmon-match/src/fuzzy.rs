//! Fuzzy string matchers built on Jaro-Winkler similarity.

use std::cmp::Ordering;

use rapidfuzz::distance::jaro_winkler::similarity as jaro_similarity;

use harmon_model::{Candidate, Table, ValueMatchEntry};

use crate::strategy::{MatchError, MatcherStrategy};
use crate::text::{normalize_text, token_set};

const TOKEN_OVERLAP_BOOST: f64 = 1.05;

/// Name similarity between two column names in `[0, 1]`.
///
/// Takes the better of raw and normalized Jaro-Winkler, with a small
/// boost when the names share a non-trivial token; clamped to 1.0.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let raw = jaro_similarity(a.to_lowercase().chars(), b.to_lowercase().chars());
    let norm = jaro_similarity(normalize_text(a).chars(), normalize_text(b).chars());
    let mut score = raw.max(norm);
    let tokens_a = token_set(a);
    let tokens_b = token_set(b);
    if tokens_a.intersection(&tokens_b).next().is_some() {
        score *= TOKEN_OVERLAP_BOOST;
    }
    score.min(1.0)
}

/// Column matcher scoring pairs by name similarity.
#[derive(Debug, Clone)]
pub struct FuzzyNameMatcher {
    name: String,
    /// Candidates scoring below this are dropped.
    threshold: f64,
}

impl FuzzyNameMatcher {
    /// Creates a matcher with the given provenance id and score floor.
    pub fn new(name: impl Into<String>, threshold: f64) -> Self {
        Self {
            name: name.into(),
            threshold,
        }
    }
}

impl Default for FuzzyNameMatcher {
    fn default() -> Self {
        Self::new("fuzzy_name", 0.0)
    }
}

impl MatcherStrategy for FuzzyNameMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn top_matches(
        &self,
        source: &Table,
        target: &Table,
        top_k: usize,
    ) -> Result<Vec<Candidate>, MatchError> {
        let mut candidates = Vec::new();
        for source_column in &source.columns {
            let mut scored: Vec<Candidate> = target
                .columns
                .iter()
                .map(|t| {
                    Candidate::new(
                        source_column.name.clone(),
                        t.name.clone(),
                        name_similarity(&source_column.name, &t.name),
                        self.name.clone(),
                    )
                })
                .filter(|c| c.score >= self.threshold)
                .collect();
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.target_column.cmp(&b.target_column))
            });
            scored.truncate(top_k);
            candidates.extend(scored);
        }
        Ok(candidates)
    }

    fn top_value_matches(
        &self,
        source_values: &[String],
        target_values: &[String],
        top_k: usize,
    ) -> Vec<ValueMatchEntry> {
        fuzzy_value_matches(source_values, target_values, top_k)
    }
}

/// Value-level matcher without a column-matching capability.
///
/// Registering it as a column matcher is rejected at registration time.
#[derive(Debug, Clone)]
pub struct FuzzyValueMatcher {
    name: String,
}

impl FuzzyValueMatcher {
    /// Creates a value matcher with the given provenance id.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for FuzzyValueMatcher {
    fn default() -> Self {
        Self::new("fuzzy_value")
    }
}

impl MatcherStrategy for FuzzyValueMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_top_matches(&self) -> bool {
        false
    }

    fn top_matches(
        &self,
        _source: &Table,
        _target: &Table,
        _top_k: usize,
    ) -> Result<Vec<Candidate>, MatchError> {
        Err(MatchError::Unsupported(self.name.clone()))
    }

    fn top_value_matches(
        &self,
        source_values: &[String],
        target_values: &[String],
        top_k: usize,
    ) -> Vec<ValueMatchEntry> {
        fuzzy_value_matches(source_values, target_values, top_k)
    }
}

/// Best-scoring target value per source value, capped at `top_k` entries.
fn fuzzy_value_matches(
    source_values: &[String],
    target_values: &[String],
    top_k: usize,
) -> Vec<ValueMatchEntry> {
    let mut entries = Vec::new();
    for source_value in source_values {
        let normalized = normalize_text(source_value);
        let mut best: Option<(f64, &String)> = None;
        for target_value in target_values {
            let score =
                jaro_similarity(normalized.chars(), normalize_text(target_value).chars());
            let better = match best {
                Some((existing, _)) => score > existing,
                None => true,
            };
            if better {
                best = Some((score, target_value));
            }
        }
        if let Some((score, target_value)) = best {
            entries.push(ValueMatchEntry {
                source_value: source_value.clone(),
                target_value: target_value.clone(),
                score,
            });
        }
    }
    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    entries.truncate(top_k);
    entries
}
