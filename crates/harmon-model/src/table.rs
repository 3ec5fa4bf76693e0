//! In-memory tabular data.
//!
//! Tables are stored column-major as optional strings. Missing cells are
//! `None`; dtype is inferred from the non-null values. This keeps the
//! matching engine independent of any particular ingestion format.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Inferred column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDtype {
    /// Every non-null value parses as a number.
    Numeric,
    /// At least one non-null value is non-numeric.
    Text,
    /// No non-null values to infer from.
    Empty,
}

/// A single named column of optional string cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as it appears in the source header.
    pub name: String,
    /// Cell values in row order; `None` is a missing value.
    pub values: Vec<Option<String>>,
}

impl Column {
    /// Creates a column from a name and raw values, treating empty
    /// strings as missing.
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|s| !s.trim().is_empty()))
            .collect();
        Self {
            name: name.into(),
            values,
        }
    }

    /// Builds a column from plain string cells.
    pub fn from_strings(name: impl Into<String>, values: &[&str]) -> Self {
        Self::new(name, values.iter().map(|v| Some((*v).to_string())).collect())
    }

    /// Number of non-null cells.
    pub fn non_null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when every cell is missing.
    pub fn is_all_null(&self) -> bool {
        self.non_null_count() == 0
    }

    /// Unique non-null values in first-seen order.
    pub fn unique_values(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut unique = Vec::new();
        for value in self.values.iter().flatten() {
            if seen.insert(value.clone()) {
                unique.push(value.clone());
            }
        }
        unique
    }

    /// Infers the dtype from non-null values.
    pub fn dtype(&self) -> ColumnDtype {
        let mut saw_value = false;
        for value in self.values.iter().flatten() {
            saw_value = true;
            if value.trim().parse::<f64>().is_err() {
                return ColumnDtype::Text;
            }
        }
        if saw_value {
            ColumnDtype::Numeric
        } else {
            ColumnDtype::Empty
        }
    }
}

/// A named table of columns with equal row counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name (typically the source file stem).
    pub name: String,
    /// Columns in original order.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Number of rows (length of the longest column).
    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Looks up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up a column, erroring when absent.
    pub fn require_column(&self, name: &str) -> Result<&Column, ModelError> {
        self.column(name)
            .ok_or_else(|| ModelError::ColumnNotFound(name.to_string()))
    }

    /// Adds a column, rejecting duplicates.
    pub fn push_column(&mut self, column: Column) -> Result<(), ModelError> {
        if self.column(&column.name).is_some() {
            return Err(ModelError::DuplicateColumn(column.name));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Restricts the table to the named columns, preserving table order.
    ///
    /// Unknown names are ignored; an empty filter yields a table with
    /// no columns.
    pub fn project(&self, names: &[String]) -> Table {
        let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        Table {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .filter(|c| wanted.contains(c.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Names of columns whose dtype is numeric.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.dtype() == ColumnDtype::Numeric)
            .map(|c| c.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_inference() {
        let numeric = Column::from_strings("age", &["70", "83"]);
        assert_eq!(numeric.dtype(), ColumnDtype::Numeric);

        let text = Column::from_strings("gender", &["Male", "Female"]);
        assert_eq!(text.dtype(), ColumnDtype::Text);

        let empty = Column::new("blank", vec![None, Some("  ".to_string())]);
        assert_eq!(empty.dtype(), ColumnDtype::Empty);
        assert!(empty.is_all_null());
    }

    #[test]
    fn unique_values_preserve_first_seen_order() {
        let column = Column::from_strings("v", &["b", "a", "b", "c", "a"]);
        assert_eq!(column.unique_values(), vec!["b", "a", "c"]);
    }

    #[test]
    fn project_keeps_table_order_and_ignores_unknown() {
        let mut table = Table::new("t");
        table
            .push_column(Column::from_strings("x", &["1"]))
            .unwrap();
        table
            .push_column(Column::from_strings("y", &["2"]))
            .unwrap();
        let projected = table.project(&["y".to_string(), "missing".to_string()]);
        assert_eq!(projected.column_names(), vec!["y"]);
    }

    #[test]
    fn projecting_onto_no_names_drops_every_column() {
        let mut table = Table::new("t");
        table
            .push_column(Column::from_strings("x", &["1"]))
            .unwrap();
        let projected = table.project(&[]);
        assert!(projected.columns.is_empty());
    }

    #[test]
    fn duplicate_column_rejected() {
        let mut table = Table::new("t");
        table
            .push_column(Column::from_strings("x", &["1"]))
            .unwrap();
        let err = table
            .push_column(Column::from_strings("x", &["2"]))
            .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateColumn(_)));
    }
}
