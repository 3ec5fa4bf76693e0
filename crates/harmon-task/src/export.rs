//! Export surfaces over a reviewed session.
//!
//! Two deliverables: a harmonized table whose columns carry the target
//! names with the source data, and a mapping document listing accepted
//! column pairs with their value-level correspondences.

use serde::Serialize;
use tracing::debug;

use harmon_model::{MatchStatus, QUADRANT_MATCHER, Table};

use crate::session::MatchingSession;

/// One value-level correspondence, aliases applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePair {
    /// Source value, after any user alias.
    pub from: String,
    /// Matched target value.
    pub to: String,
}

/// One accepted column mapping with its value pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    /// Source table column.
    pub source_column: String,
    /// Target schema column.
    pub target_column: String,
    /// Value correspondences; empty for non-categorical columns.
    pub value_matches: Vec<ValuePair>,
}

impl MatchingSession {
    /// Accepted (source, target) pairs, deduplicated in merge order.
    pub fn accepted_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for candidate in &self.candidates {
            if candidate.status != MatchStatus::Accepted {
                continue;
            }
            let pair = (
                candidate.source_column.clone(),
                candidate.target_column.clone(),
            );
            if !pairs.contains(&pair) {
                pairs.push(pair);
            }
        }
        pairs
    }

    /// Harmonized table: one column per accepted pair, named after the
    /// target, carrying the source column's values.
    ///
    /// When several source columns were accepted onto one target, the
    /// first pair in merge order wins; quadrant-classified pairs sort
    /// first in that order, so auto-accepted matches take precedence.
    pub fn accepted_table(&self, name: impl Into<String>) -> Table {
        let mut pairs = self.accepted_pairs();
        pairs.sort_by_key(|(source, target)| {
            let quadrant = self
                .candidates
                .iter()
                .any(|c| c.is_pair(source, target) && c.matcher == QUADRANT_MATCHER);
            !quadrant
        });

        let mut table = Table::new(name);
        for (source, target) in pairs {
            let Some(column) = self.source.column(&source) else {
                continue;
            };
            let mut exported = column.clone();
            exported.name = target.clone();
            if let Err(error) = table.push_column(exported) {
                debug!(%source, %target, %error, "skipping duplicate export column");
            }
        }
        table
    }

    /// Accepted mappings with value-level pairs, aliases applied.
    pub fn accepted_mapping(&self) -> Vec<ColumnMapping> {
        self.accepted_pairs()
            .into_iter()
            .map(|(source_column, target_column)| {
                let value_matches = self
                    .value_matches
                    .get(&source_column)
                    .map(|table| {
                        table
                            .pairs_for(&target_column)
                            .into_iter()
                            .map(|(from, to)| ValuePair { from, to })
                            .collect()
                    })
                    .unwrap_or_default();
                ColumnMapping {
                    source_column,
                    target_column,
                    value_matches,
                }
            })
            .collect()
    }
}
