//! Column profiles computed at ingest.

use serde::{Deserialize, Serialize};

use crate::table::{Column, ColumnDtype};

/// Summary statistics for a source column.
///
/// Used by matcher strategies to adjust scoring (numeric compatibility,
/// sparsity) without re-scanning the data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// True when the column dtype is numeric.
    pub is_numeric: bool,
    /// Ratio of distinct non-null values to total rows (0.0 to 1.0).
    pub unique_ratio: f64,
    /// Ratio of missing values to total rows (0.0 to 1.0).
    pub null_ratio: f64,
    /// Optional label from source metadata.
    pub label: Option<String>,
}

impl ColumnProfile {
    /// Profiles a column.
    pub fn of(column: &Column) -> Self {
        let total = column.values.len();
        if total == 0 {
            return Self::default();
        }
        let non_null = column.non_null_count();
        Self {
            is_numeric: column.dtype() == ColumnDtype::Numeric,
            unique_ratio: column.unique_values().len() as f64 / total as f64,
            null_ratio: (total - non_null) as f64 / total as f64,
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_ratios() {
        let column = Column::new(
            "v",
            vec![
                Some("a".to_string()),
                Some("a".to_string()),
                Some("b".to_string()),
                None,
            ],
        );
        let profile = ColumnProfile::of(&column);
        assert!(!profile.is_numeric);
        assert!((profile.unique_ratio - 0.5).abs() < 1e-12);
        assert!((profile.null_ratio - 0.25).abs() < 1e-12);
    }
}
