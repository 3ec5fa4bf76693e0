//! Target ontology lookup.
//!
//! The target schema is usually a curated data dictionary whose columns
//! carry structured descriptions: a category, a grouping node, a data
//! type, and optionally a permissible-value enumeration or numeric
//! bounds. The engine consults these to filter target columns by node,
//! to decide categorical treatment, and to populate the value-match
//! target universe.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::{Column, Table};

/// Structured description of one target column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescription {
    /// Broad category (e.g. "clinical", "demographic").
    pub category: String,
    /// Grouping node used for node filtering.
    pub node: String,
    /// Declared data type (e.g. "string", "number", "enum").
    pub data_type: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Permissible values for enum columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Upper bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Lower bound for numeric columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
}

/// Lookup of target column descriptions.
pub trait TargetOntology: Send + Sync {
    /// Returns the description for a target column, if known.
    fn describe(&self, column: &str) -> Option<TargetDescription>;

    /// Target columns belonging to any of the given nodes.
    ///
    /// An empty node list means "no filter"; unknown columns never match.
    fn columns_in_nodes(&self, columns: &[String], nodes: &[String]) -> Vec<String> {
        if nodes.is_empty() {
            return columns.to_vec();
        }
        columns
            .iter()
            .filter(|c| {
                self.describe(c)
                    .is_some_and(|d| nodes.iter().any(|n| n == &d.node))
            })
            .cloned()
            .collect()
    }
}

/// Dictionary-backed ontology held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOntology {
    entries: BTreeMap<String, TargetDescription>,
}

impl InMemoryOntology {
    /// Creates an empty ontology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an ontology from (column, description) pairs.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, TargetDescription)>,
    ) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Adds or replaces a column description.
    pub fn insert(&mut self, column: impl Into<String>, description: TargetDescription) {
        self.entries.insert(column.into(), description);
    }

    /// Number of described columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no columns are described.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Synthesizes a target table from the dictionary: one column per
    /// described entry, populated with its enum values when present.
    ///
    /// Used when no target table is supplied and matching runs against
    /// the reference dictionary directly.
    pub fn to_table(&self, name: impl Into<String>) -> Table {
        let mut table = Table::new(name);
        for (column, description) in &self.entries {
            let values = description
                .enum_values
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(Some)
                .collect();
            // Entries are keyed by name, so the push cannot collide.
            let _ = table.push_column(Column::new(column.clone(), values));
        }
        table
    }
}

impl TargetOntology for InMemoryOntology {
    fn describe(&self, column: &str) -> Option<TargetDescription> {
        self.entries.get(column).cloned()
    }
}

/// Built-in reference dictionary used when no target table is supplied.
///
/// A small clinical-demographics vocabulary; enough to exercise node
/// filtering, enum-driven value matching, and numeric bounds.
pub fn reference_dictionary() -> InMemoryOntology {
    let mut ontology = InMemoryOntology::new();
    ontology.insert(
        "gender",
        TargetDescription {
            category: "clinical".to_string(),
            node: "demographic".to_string(),
            data_type: "enum".to_string(),
            description: "Self-reported gender".to_string(),
            enum_values: Some(vec![
                "male".to_string(),
                "female".to_string(),
                "unknown".to_string(),
            ]),
            ..TargetDescription::default()
        },
    );
    ontology.insert(
        "race",
        TargetDescription {
            category: "clinical".to_string(),
            node: "demographic".to_string(),
            data_type: "enum".to_string(),
            description: "Self-reported race".to_string(),
            enum_values: Some(vec![
                "white".to_string(),
                "black or african american".to_string(),
                "asian".to_string(),
                "other".to_string(),
                "not reported".to_string(),
            ]),
            ..TargetDescription::default()
        },
    );
    ontology.insert(
        "age",
        TargetDescription {
            category: "clinical".to_string(),
            node: "demographic".to_string(),
            data_type: "number".to_string(),
            description: "Age at enrollment in years".to_string(),
            minimum: Some(0.0),
            maximum: Some(120.0),
            ..TargetDescription::default()
        },
    );
    ontology.insert(
        "vital_status",
        TargetDescription {
            category: "clinical".to_string(),
            node: "follow_up".to_string(),
            data_type: "enum".to_string(),
            description: "Survival state at last follow-up".to_string(),
            enum_values: Some(vec![
                "alive".to_string(),
                "dead".to_string(),
                "not reported".to_string(),
            ]),
            ..TargetDescription::default()
        },
    );
    ontology.insert(
        "days_to_death",
        TargetDescription {
            category: "clinical".to_string(),
            node: "follow_up".to_string(),
            data_type: "number".to_string(),
            description: "Days from enrollment to death".to_string(),
            minimum: Some(0.0),
            ..TargetDescription::default()
        },
    );
    ontology
}
