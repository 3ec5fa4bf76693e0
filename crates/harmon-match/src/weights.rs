//! Feedback-driven matcher weight learning.
//!
//! Each matcher carries a normalized trust weight. When a reviewer
//! accepts or rejects a pair, every matcher that proposed that pair is
//! credited (or penalized) in proportion to the candidate's score and
//! inversely to the rank the matcher itself gave it — matchers that
//! ranked a confirmed pair high gain more than matchers that buried it.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use harmon_model::{Candidate, MatcherEntry, OperationKind};

/// Default reward rate applied on accept.
pub const DEFAULT_ALPHA: f64 = 0.1;
/// Default penalty rate applied on reject.
pub const DEFAULT_BETA: f64 = 0.1;

/// Online weight updater over the matcher registry.
#[derive(Debug, Clone)]
pub struct WeightUpdater {
    matchers: BTreeMap<String, MatcherEntry>,
    /// Per matcher, its candidates sorted descending by score.
    by_matcher: BTreeMap<String, Vec<Candidate>>,
    alpha: f64,
    beta: f64,
}

impl WeightUpdater {
    /// Builds an updater from registry entries and the current candidate
    /// set, grouping candidates per matcher and sorting by score.
    pub fn new(
        entries: impl IntoIterator<Item = MatcherEntry>,
        candidates: &[Candidate],
        alpha: f64,
        beta: f64,
    ) -> Self {
        let matchers: BTreeMap<String, MatcherEntry> = entries
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        let mut by_matcher: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            if matchers.contains_key(&candidate.matcher) {
                by_matcher
                    .entry(candidate.matcher.clone())
                    .or_default()
                    .push(candidate.clone());
            }
        }
        for group in by_matcher.values_mut() {
            group.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        }
        Self {
            matchers,
            by_matcher,
            alpha,
            beta,
        }
    }

    /// Builds an updater with the default learning rates.
    pub fn with_defaults(
        entries: impl IntoIterator<Item = MatcherEntry>,
        candidates: &[Candidate],
    ) -> Self {
        Self::new(entries, candidates, DEFAULT_ALPHA, DEFAULT_BETA)
    }

    /// Applies one accept/reject update for a pair, then renormalizes.
    ///
    /// For each matcher the first candidate equal to the pair (in its
    /// own score order) determines rank; `delta = ±rate * score /
    /// (rank + 1)`. Other verbs are logged and ignored.
    pub fn update(&mut self, operation: OperationKind, source: &str, target: &str) {
        let rate = match operation {
            OperationKind::Accept => self.alpha,
            OperationKind::Reject => -self.beta,
            other => {
                debug!(operation = other.as_str(), "weight update ignores verb");
                return;
            }
        };
        for (name, group) in &self.by_matcher {
            // First match only; a pair repeated under one matcher is
            // counted once.
            if let Some((rank, candidate)) = group
                .iter()
                .enumerate()
                .find(|(_, c)| c.is_pair(source, target))
                && let Some(entry) = self.matchers.get_mut(name)
            {
                let delta = rate * candidate.score / (rank as f64 + 1.0);
                entry.weight = (entry.weight + delta).max(0.0);
            }
        }
        self.normalize(false);
    }

    /// Renormalizes weights to sum to 1.0.
    ///
    /// A zero sum, or an explicit reset, assigns uniform `1/N`.
    pub fn normalize(&mut self, reset: bool) {
        let count = self.matchers.len();
        if count == 0 {
            return;
        }
        let total: f64 = self.matchers.values().map(|e| e.weight).sum();
        if reset || total == 0.0 {
            let uniform = 1.0 / count as f64;
            for entry in self.matchers.values_mut() {
                entry.weight = uniform;
            }
            return;
        }
        for entry in self.matchers.values_mut() {
            entry.weight /= total;
        }
    }

    /// Current weight of a matcher.
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.matchers.get(name).map(|e| e.weight)
    }

    /// Registry entries with their current weights, registry order.
    pub fn entries(&self) -> Vec<MatcherEntry> {
        self.matchers.values().cloned().collect()
    }

    /// Sum of all weights (1.0 after normalization, within tolerance).
    pub fn total_weight(&self) -> f64 {
        self.matchers.values().map(|e| e.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<MatcherEntry> {
        vec![
            MatcherEntry::new("fuzzy_name", 0.5),
            MatcherEntry::new("ngram_embedding", 0.5),
        ]
    }

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new("Gender", "gender", 0.9, "fuzzy_name"),
            Candidate::new("Gender", "race", 0.3, "fuzzy_name"),
            Candidate::new("Gender", "gender", 0.6, "ngram_embedding"),
        ]
    }

    #[test]
    fn accept_then_reject_moves_weight_by_rate_times_score() {
        let mut updater = WeightUpdater::new(entries(), &candidates(), 0.1, 0.2);

        // fuzzy_name ranks the pair at 0 with score 0.9.
        updater.update(OperationKind::Accept, "Gender", "gender");
        // Before renormalization the delta was +0.1 * 0.9; both matchers
        // gained, so compare relative movement instead of raw values.
        let after_accept = updater.weight("fuzzy_name").unwrap();
        assert!(after_accept > 0.5 - 1e-9);

        updater.update(OperationKind::Reject, "Gender", "gender");
        let after_reject = updater.weight("fuzzy_name").unwrap();
        assert!(after_reject < after_accept);
        assert!((updater.total_weight() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rank_discounts_the_delta() {
        let candidates = vec![
            Candidate::new("a", "x", 0.9, "fuzzy_name"),
            Candidate::new("a", "y", 0.8, "fuzzy_name"),
            Candidate::new("a", "y", 0.8, "ngram_embedding"),
        ];
        let mut updater = WeightUpdater::new(entries(), &candidates, 0.1, 0.1);
        updater.update(OperationKind::Accept, "a", "y");
        // fuzzy_name found the pair at rank 1, the embedding at rank 0
        // with equal score, so the embedding gains more.
        assert!(
            updater.weight("ngram_embedding").unwrap() > updater.weight("fuzzy_name").unwrap()
        );
    }

    #[test]
    fn non_review_verbs_are_ignored() {
        let mut updater = WeightUpdater::with_defaults(entries(), &candidates());
        let before = updater.weight("fuzzy_name").unwrap();
        updater.update(OperationKind::Discard, "Gender", "gender");
        updater.update(OperationKind::Append, "Gender", "gender");
        assert_eq!(updater.weight("fuzzy_name").unwrap(), before);
    }

    #[test]
    fn reset_assigns_uniform_weights() {
        let mut updater = WeightUpdater::with_defaults(entries(), &[]);
        updater.normalize(true);
        assert!((updater.weight("fuzzy_name").unwrap() - 0.5).abs() < 1e-12);
        assert!((updater.weight("ngram_embedding").unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_sum_falls_back_to_uniform() {
        let zeroed = vec![
            MatcherEntry::new("fuzzy_name", 0.0),
            MatcherEntry::new("ngram_embedding", 0.0),
        ];
        let mut updater = WeightUpdater::with_defaults(zeroed, &[]);
        updater.normalize(false);
        assert!((updater.total_weight() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_registry_is_a_no_op() {
        let mut updater = WeightUpdater::with_defaults(Vec::new(), &[]);
        updater.normalize(false);
        assert_eq!(updater.total_weight(), 0.0);
    }
}
