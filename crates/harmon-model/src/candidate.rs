//! Mapping candidates and matcher registry entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Matcher id assigned to quadrant-classified easy matches.
pub const QUADRANT_MATCHER: &str = "candidate_quadrants";

/// Review status of a candidate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Not yet reviewed.
    #[default]
    Idle,
    /// Confirmed by the reviewer (or auto-accepted by the quadrant
    /// classifier).
    Accepted,
    /// Explicitly rejected by the reviewer.
    Rejected,
    /// The whole source column was set aside.
    Discarded,
}

/// A proposed source-to-target column mapping.
///
/// Uniquely keyed by (source, target, matcher) during merge; status
/// mutations match on (source, target) only, so a review decision is
/// authoritative for the pair across every matcher row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Source table column name.
    pub source_column: String,
    /// Target schema column name.
    pub target_column: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
    /// Id of the strategy that produced this candidate.
    pub matcher: String,
    /// Current review status.
    #[serde(default)]
    pub status: MatchStatus,
}

impl Candidate {
    /// Creates an idle candidate.
    pub fn new(
        source_column: impl Into<String>,
        target_column: impl Into<String>,
        score: f64,
        matcher: impl Into<String>,
    ) -> Self {
        Self {
            source_column: source_column.into(),
            target_column: target_column.into(),
            score,
            matcher: matcher.into(),
            status: MatchStatus::Idle,
        }
    }

    /// Creates an auto-accepted quadrant-classifier candidate.
    pub fn easy(source_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            target_column: target_column.into(),
            score: 1.0,
            matcher: QUADRANT_MATCHER.to_string(),
            status: MatchStatus::Accepted,
        }
    }

    /// True when this candidate maps the given pair.
    pub fn is_pair(&self, source: &str, target: &str) -> bool {
        self.source_column == source && self.target_column == target
    }
}

/// A registered matcher strategy with its learned weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherEntry {
    /// Strategy id, unique within the registry.
    pub name: String,
    /// Normalized trust weight; entries sum to 1.0 after any update.
    pub weight: f64,
    /// Construction parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Plugin definition source, present only for runtime-registered
    /// matchers so they can be reconstructed across restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl MatcherEntry {
    /// Creates an entry with the given initial weight and no parameters.
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            params: BTreeMap::new(),
            code: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_serializes_camel_case() {
        let candidate = Candidate::easy("Gender", "gender");
        let json = serde_json::to_value(&candidate).unwrap();
        assert_eq!(json["sourceColumn"], "Gender");
        assert_eq!(json["targetColumn"], "gender");
        assert_eq!(json["matcher"], QUADRANT_MATCHER);
        assert_eq!(json["status"], "accepted");
        assert_eq!(json["score"], 1.0);
    }

    #[test]
    fn status_defaults_to_idle_on_deserialize() {
        let candidate: Candidate = serde_json::from_str(
            r#"{"sourceColumn":"a","targetColumn":"b","score":0.5,"matcher":"fuzzy"}"#,
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Idle);
    }
}
