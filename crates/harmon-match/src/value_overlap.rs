//! Value-overlap column matching.

use std::cmp::Ordering;

use rapidfuzz::distance::jaro_winkler::similarity as jaro_similarity;

use harmon_model::{Candidate, ColumnProfile, Table, ValueMatchEntry};

use crate::strategy::{MatchError, MatcherStrategy};
use crate::text::normalize_text;

/// Cap on unique values compared per column pair.
const VALUE_SAMPLE_CAP: usize = 50;
/// Score multiplier when one column is numeric and the other is not.
const DTYPE_MISMATCH_FACTOR: f64 = 0.5;

fn dtype_factor(source: &ColumnProfile, target: &ColumnProfile) -> f64 {
    if source.is_numeric == target.is_numeric {
        1.0
    } else {
        DTYPE_MISMATCH_FACTOR
    }
}

/// Similarity of two value sets in `[0, 1]`.
///
/// Mean best Jaro-Winkler similarity of each source value against the
/// target values, over a bounded sample. Empty sides score 0.
pub fn value_set_similarity(source_values: &[String], target_values: &[String]) -> f64 {
    if source_values.is_empty() || target_values.is_empty() {
        return 0.0;
    }
    let source_sample = &source_values[..source_values.len().min(VALUE_SAMPLE_CAP)];
    let target_sample = &target_values[..target_values.len().min(VALUE_SAMPLE_CAP)];
    let mut total = 0.0;
    for source_value in source_sample {
        let normalized = normalize_text(source_value);
        let best = target_sample
            .iter()
            .map(|t| jaro_similarity(normalized.chars(), normalize_text(t).chars()))
            .fold(0.0f64, f64::max);
        total += best;
    }
    total / source_sample.len() as f64
}

/// Column matcher scoring pairs by observed-value similarity.
///
/// Value-set similarity is damped when the column profiles disagree on
/// numeric dtype, so a numeric column does not pair with a text column
/// just because their values share characters.
#[derive(Debug, Clone)]
pub struct ValueOverlapMatcher {
    name: String,
}

impl ValueOverlapMatcher {
    /// Creates a matcher with the given provenance id.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ValueOverlapMatcher {
    fn default() -> Self {
        Self::new("value_overlap")
    }
}

impl MatcherStrategy for ValueOverlapMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn top_matches(
        &self,
        source: &Table,
        target: &Table,
        top_k: usize,
    ) -> Result<Vec<Candidate>, MatchError> {
        let target_uniques: Vec<(String, Vec<String>, ColumnProfile)> = target
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.unique_values(), ColumnProfile::of(c)))
            .collect();

        let mut candidates = Vec::new();
        for source_column in &source.columns {
            let source_uniques = source_column.unique_values();
            let source_profile = ColumnProfile::of(source_column);
            let mut scored: Vec<Candidate> = target_uniques
                .iter()
                .map(|(target_name, target_values, target_profile)| {
                    let score = value_set_similarity(&source_uniques, target_values)
                        * dtype_factor(&source_profile, target_profile);
                    Candidate::new(
                        source_column.name.clone(),
                        target_name.clone(),
                        score,
                        self.name.clone(),
                    )
                })
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
        let mut entries: Vec<ValueMatchEntry> = source_values
            .iter()
            .map(|source_value| {
                let normalized = normalize_text(source_value);
                let (score, target_value) = target_values
                    .iter()
                    .map(|t| {
                        (
                            jaro_similarity(normalized.chars(), normalize_text(t).chars()),
                            t.clone(),
                        )
                    })
                    .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
                    .unwrap_or((0.0, String::new()));
                ValueMatchEntry {
                    source_value: source_value.clone(),
                    target_value,
                    score,
                }
            })
            .collect();
        entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        entries.truncate(top_k);
        entries
    }
}
