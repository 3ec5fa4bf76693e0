//! The persisted cache record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use harmon_model::{Candidate, MatcherEntry, ValueMatchTable};

/// Snapshot of a full generation pass, keyed by input content hashes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Content hash of the source table at generation time.
    pub source_hash: String,
    /// Content hash of the target table at generation time.
    pub target_hash: String,
    /// Merged candidate set including review statuses.
    pub candidates: Vec<Candidate>,
    /// Source-column cluster map (representative -> members).
    #[serde(default)]
    pub source_clusters: BTreeMap<String, Vec<String>>,
    /// Per source column value-match tables.
    #[serde(default)]
    pub value_matches: BTreeMap<String, ValueMatchTable>,
    /// Matcher registry entries with learned weights.
    #[serde(default)]
    pub matchers: Vec<MatcherEntry>,
    /// Plugin definition sources keyed by matcher name, kept so
    /// runtime-registered matchers survive a restart.
    #[serde(default)]
    pub matcher_code: BTreeMap<String, String>,
    /// Node filter the candidates were generated under.
    #[serde(default)]
    pub nodes: Vec<String>,
}

impl CacheRecord {
    /// Validity test: both hashes and the node filter must match
    /// exactly (order-sensitive).
    pub fn is_valid_for(&self, source_hash: &str, target_hash: &str, nodes: &[String]) -> bool {
        self.source_hash == source_hash && self.target_hash == target_hash && self.nodes == nodes
    }
}
