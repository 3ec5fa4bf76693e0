//! Quadrant classification of source/target column pairs.
//!
//! For every source column the classifier unions the top-k targets by
//! name similarity with the top-k by value similarity, then buckets each
//! pair by whether the two scores clear their thresholds:
//! `index = 2*is_name_high + is_value_high`. Bucket 3 (high, high) is
//! "easy", buckets 1 and 2 are "potential", bucket 0 is "unrelated".

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use harmon_model::{Candidate, Table};

use crate::fuzzy::name_similarity;
use crate::value_overlap::value_set_similarity;

/// Extra name-score margin required by very-high easy matching.
const VERY_HIGH_NAME_MARGIN: f64 = 0.25;
/// Extra value-score margin admitting (high, high) pairs in very-high mode.
const VERY_HIGH_VALUE_MARGIN: f64 = 0.2;

/// The four similarity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// Low name, low value.
    Unrelated,
    /// Low name, high value.
    ValueHigh,
    /// High name, low value.
    NameHigh,
    /// High name, high value.
    Easy,
}

impl Quadrant {
    /// Bucket index `2*is_name_high + is_value_high`.
    pub fn index(self) -> usize {
        match self {
            Self::Unrelated => 0,
            Self::ValueHigh => 1,
            Self::NameHigh => 2,
            Self::Easy => 3,
        }
    }
}

/// Score thresholds separating "high" from "low".
#[derive(Debug, Clone, Copy)]
pub struct QuadrantThresholds {
    /// Column-name similarity threshold.
    pub column_name: f64,
    /// Value similarity threshold.
    pub value: f64,
}

impl Default for QuadrantThresholds {
    fn default() -> Self {
        Self {
            column_name: 0.7,
            value: 0.4,
        }
    }
}

/// A scored (source, target) pair inside a bucket.
#[derive(Debug, Clone)]
struct PairScores {
    target: String,
    name_score: f64,
    value_score: f64,
}

type Partition = BTreeMap<String, [Vec<PairScores>; 4]>;

/// Lazily-computed quadrant partition for a pair of tables.
///
/// The partition is computed once on first access and memoized. The two
/// delegate similarity passes run inside the computation; nothing about
/// them is retained afterwards.
pub struct QuadrantClassifier {
    source: Table,
    target: Table,
    top_k: usize,
    thresholds: QuadrantThresholds,
    partition: OnceLock<Partition>,
}

impl QuadrantClassifier {
    /// Creates a classifier over the given tables.
    pub fn new(source: Table, target: Table, top_k: usize, thresholds: QuadrantThresholds) -> Self {
        Self {
            source,
            target,
            top_k: top_k.max(1),
            thresholds,
            partition: OnceLock::new(),
        }
    }

    fn partition(&self) -> &Partition {
        self.partition.get_or_init(|| self.compute_partition())
    }

    /// Scores every pair, takes the two top-k lists per source column,
    /// unions them (name-match order first, value-only appended), and
    /// buckets the union.
    fn compute_partition(&self) -> Partition {
        let target_uniques: Vec<(String, Vec<String>)> = self
            .target
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.unique_values()))
            .collect();

        let mut partition = Partition::new();
        for source_column in &self.source.columns {
            let source_uniques = source_column.unique_values();

            let mut name_scored: Vec<(String, f64)> = self
                .target
                .columns
                .iter()
                .map(|t| (t.name.clone(), name_similarity(&source_column.name, &t.name)))
                .collect();
            name_scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            let mut value_scored: Vec<(String, f64)> = target_uniques
                .iter()
                .map(|(name, values)| (name.clone(), value_set_similarity(&source_uniques, values)))
                .collect();
            value_scored.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            });

            let name_scores: BTreeMap<&str, f64> = name_scored
                .iter()
                .map(|(name, score)| (name.as_str(), *score))
                .collect();
            let value_scores: BTreeMap<&str, f64> = value_scored
                .iter()
                .map(|(name, score)| (name.as_str(), *score))
                .collect();

            // Union, name-match order first, then value-only matches.
            let mut union: Vec<String> = Vec::new();
            let mut seen = BTreeSet::new();
            for (name, _) in name_scored.iter().take(self.top_k) {
                if seen.insert(name.clone()) {
                    union.push(name.clone());
                }
            }
            for (name, _) in value_scored.iter().take(self.top_k) {
                if seen.insert(name.clone()) {
                    union.push(name.clone());
                }
            }

            let mut buckets: [Vec<PairScores>; 4] = Default::default();
            for target_name in union {
                let name_score = name_scores.get(target_name.as_str()).copied().unwrap_or(0.0);
                let value_score = value_scores
                    .get(target_name.as_str())
                    .copied()
                    .unwrap_or(0.0);
                let is_name_high = name_score >= self.thresholds.column_name;
                let is_value_high = value_score >= self.thresholds.value;
                let index = 2 * usize::from(is_name_high) + usize::from(is_value_high);
                buckets[index].push(PairScores {
                    target: target_name,
                    name_score,
                    value_score,
                });
            }
            partition.insert(source_column.name.clone(), buckets);
        }
        partition
    }

    fn source_has_values(&self, column: &str) -> bool {
        self.source.column(column).is_some_and(|c| !c.is_all_null())
    }

    /// Targets in the (high, high) bucket for a source column.
    ///
    /// Very-high mode instead requires the name score to exceed
    /// `threshold + 0.25` over the (high, high) and (high, low) buckets,
    /// and — only when the column has at least one non-null value —
    /// additionally admits (high, high) targets whose value score
    /// exceeds `threshold + 0.2`. Returned deduplicated and sorted.
    pub fn easy_matches(&self, column: &str, very_high: bool) -> Vec<String> {
        let Some(buckets) = self.partition().get(column) else {
            return Vec::new();
        };
        let mut matches = BTreeSet::new();
        if very_high {
            let name_floor = self.thresholds.column_name + VERY_HIGH_NAME_MARGIN;
            for index in [Quadrant::Easy.index(), Quadrant::NameHigh.index()] {
                for pair in &buckets[index] {
                    if pair.name_score > name_floor {
                        matches.insert(pair.target.clone());
                    }
                }
            }
            if self.source_has_values(column) {
                let value_floor = self.thresholds.value + VERY_HIGH_VALUE_MARGIN;
                for pair in &buckets[Quadrant::Easy.index()] {
                    if pair.value_score > value_floor {
                        matches.insert(pair.target.clone());
                    }
                }
            }
        } else {
            for pair in &buckets[Quadrant::Easy.index()] {
                matches.insert(pair.target.clone());
            }
        }
        matches.into_iter().collect()
    }

    /// Targets in (high, low), plus (low, high) when the column has any
    /// non-null value, minus anything already easy. First-seen order.
    pub fn potential_matches(&self, column: &str) -> Vec<String> {
        let Some(buckets) = self.partition().get(column) else {
            return Vec::new();
        };
        let easy: BTreeSet<String> = self.easy_matches(column, false).into_iter().collect();
        let mut seen = BTreeSet::new();
        let mut matches = Vec::new();
        let mut indices = vec![Quadrant::NameHigh.index()];
        if self.source_has_values(column) {
            indices.push(Quadrant::ValueHigh.index());
        }
        for index in indices {
            for pair in &buckets[index] {
                if !easy.contains(&pair.target) && seen.insert(pair.target.clone()) {
                    matches.push(pair.target.clone());
                }
            }
        }
        matches
    }

    /// Targets in the (low, low) bucket, deduplicated, first-seen order.
    pub fn unrelated_columns(&self, column: &str) -> Vec<String> {
        let Some(buckets) = self.partition().get(column) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut unrelated = Vec::new();
        for pair in &buckets[Quadrant::Unrelated.index()] {
            if seen.insert(pair.target.clone()) {
                unrelated.push(pair.target.clone());
            }
        }
        unrelated
    }

    /// Every bucketed target for a source column, across all quadrants.
    pub fn all_bucketed(&self, column: &str) -> Vec<String> {
        let Some(buckets) = self.partition().get(column) else {
            return Vec::new();
        };
        buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|p| p.target.clone()))
            .collect()
    }

    /// Numeric-dtype target columns (a convenience projection).
    pub fn numeric_targets(&self) -> Vec<String> {
        self.target.numeric_columns()
    }

    /// Easy matches for every source column as auto-accepted candidates
    /// (`score = 1.0`, `matcher = "candidate_quadrants"`).
    pub fn easy_candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for source_column in &self.source.columns {
            for target in self.easy_matches(&source_column.name, false) {
                candidates.push(Candidate::easy(source_column.name.clone(), target));
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use harmon_model::{Column, MatchStatus, QUADRANT_MATCHER};

    use super::*;

    fn demo_classifier() -> QuadrantClassifier {
        let mut source = Table::new("patients");
        source
            .push_column(Column::from_strings("Gender", &["Male", "Female"]))
            .unwrap();
        source
            .push_column(Column::from_strings("Age", &["70", "83"]))
            .unwrap();
        let mut target = Table::new("dictionary");
        target
            .push_column(Column::from_strings("gender", &["male", "female"]))
            .unwrap();
        target
            .push_column(Column::from_strings("age", &["70", "83"]))
            .unwrap();
        QuadrantClassifier::new(source, target, 10, QuadrantThresholds::default())
    }

    #[test]
    fn gender_and_age_land_in_easy_bucket() {
        let classifier = demo_classifier();
        assert!(classifier
            .easy_matches("Gender", false)
            .contains(&"gender".to_string()));
        assert!(classifier
            .easy_matches("Age", false)
            .contains(&"age".to_string()));
    }

    #[test]
    fn easy_candidates_are_auto_accepted() {
        let classifier = demo_classifier();
        let candidates = classifier.easy_candidates();
        let gender = candidates
            .iter()
            .find(|c| c.source_column == "Gender" && c.target_column == "gender")
            .unwrap();
        assert_eq!(gender.score, 1.0);
        assert_eq!(gender.matcher, QUADRANT_MATCHER);
        assert_eq!(gender.status, MatchStatus::Accepted);
    }

    #[test]
    fn buckets_are_disjoint_and_cover_the_union() {
        let classifier = demo_classifier();
        for column in ["Gender", "Age"] {
            let easy = classifier.easy_matches(column, false);
            let potential = classifier.potential_matches(column);
            let unrelated = classifier.unrelated_columns(column);
            for target in &easy {
                assert!(!potential.contains(target));
                assert!(!unrelated.contains(target));
            }
            for target in &potential {
                assert!(!unrelated.contains(target));
            }
            let all = classifier.all_bucketed(column);
            assert_eq!(all.len(), easy.len() + potential.len() + unrelated.len());
        }
    }

    #[test]
    fn all_null_column_skips_value_driven_buckets() {
        let mut source = Table::new("s");
        source
            .push_column(Column::new("mystery", vec![None, None]))
            .unwrap();
        let mut target = Table::new("t");
        target
            .push_column(Column::from_strings("gender", &["male"]))
            .unwrap();
        let classifier =
            QuadrantClassifier::new(source, target, 5, QuadrantThresholds::default());
        // Value scores are zero, so nothing value-driven can surface.
        assert!(classifier.easy_matches("mystery", true).is_empty());
        assert!(classifier.potential_matches("mystery").is_empty());
    }
}
