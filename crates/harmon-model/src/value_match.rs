//! Per-column value-level match tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A single value-to-value correspondence produced by a value matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMatchEntry {
    /// Source value as observed.
    pub source_value: String,
    /// Best-matching target value ("" when nothing matched).
    pub target_value: String,
    /// Similarity score in `[0, 1]`.
    pub score: f64,
}

/// Value mappings for one source column against any number of targets.
///
/// `source_mapped_values` starts as a copy of `source_unique_values` and
/// is user-editable aliasing; `targets[t]` is index-aligned with
/// `source_unique_values` for every generated target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMatchTable {
    /// Unique non-null source values in first-seen order.
    pub source_unique_values: Vec<String>,
    /// User-editable aliases, same length as `source_unique_values`.
    pub source_mapped_values: Vec<String>,
    /// Matched target value per source value, per target column.
    pub targets: BTreeMap<String, Vec<String>>,
}

impl ValueMatchTable {
    /// Creates a table for the given unique values with identity aliases.
    pub fn new(source_unique_values: Vec<String>) -> Self {
        let source_mapped_values = source_unique_values.clone();
        Self {
            source_unique_values,
            source_mapped_values,
            targets: BTreeMap::new(),
        }
    }

    /// True when matches were already generated for the target.
    pub fn has_target(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    /// Records the matched value list for a target.
    ///
    /// The list must be index-aligned with `source_unique_values`.
    /// Idempotent: an existing entry is left unchanged, making repeated
    /// generation for the same target a no-op.
    pub fn insert_target(
        &mut self,
        target: impl Into<String>,
        matched: Vec<String>,
    ) -> Result<(), ModelError> {
        let target = target.into();
        if matched.len() != self.source_unique_values.len() {
            return Err(ModelError::LengthMismatch {
                context: target,
                expected: self.source_unique_values.len(),
                actual: matched.len(),
            });
        }
        self.targets.entry(target).or_insert(matched);
        Ok(())
    }

    /// Sets the alias for a source value; false when the value is unknown.
    pub fn set_alias(&mut self, source_value: &str, alias: impl Into<String>) -> bool {
        match self
            .source_unique_values
            .iter()
            .position(|v| v == source_value)
        {
            Some(idx) => {
                self.source_mapped_values[idx] = alias.into();
                true
            }
            None => false,
        }
    }

    /// `{from, to}` pairs for a target, honoring aliases.
    ///
    /// `from` is the (possibly aliased) source value, `to` the matched
    /// target value; pairs with no match are skipped.
    pub fn pairs_for(&self, target: &str) -> Vec<(String, String)> {
        let Some(matched) = self.targets.get(target) else {
            return Vec::new();
        };
        self.source_mapped_values
            .iter()
            .zip(matched.iter())
            .filter(|(_, to)| !to.is_empty())
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect()
    }
}
