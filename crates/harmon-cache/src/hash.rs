//! Stable content hashing for tables.

use sha2::{Digest, Sha256};

use harmon_model::Table;

/// SHA-256 content hash over the full table, hex-encoded.
///
/// Order-sensitive and index-sensitive: the digest covers column order,
/// column names, row positions, and every cell including nulls, so any
/// reordering or single-cell edit changes the hash. Field separators are
/// length-prefixed to avoid ambiguity between adjacent values.
pub fn table_content_hash(table: &Table) -> String {
    let mut hasher = Sha256::new();
    update_str(&mut hasher, &table.name);
    hasher.update((table.columns.len() as u64).to_le_bytes());
    for (column_index, column) in table.columns.iter().enumerate() {
        hasher.update((column_index as u64).to_le_bytes());
        update_str(&mut hasher, &column.name);
        hasher.update((column.values.len() as u64).to_le_bytes());
        for (row_index, value) in column.values.iter().enumerate() {
            hasher.update((row_index as u64).to_le_bytes());
            match value {
                Some(v) => {
                    hasher.update([1u8]);
                    update_str(&mut hasher, v);
                }
                None => hasher.update([0u8]),
            }
        }
    }
    hex::encode(hasher.finalize())
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use harmon_model::Column;

    use super::*;

    fn sample() -> Table {
        let mut table = Table::new("t");
        table
            .push_column(Column::from_strings("Gender", &["Male", "Female"]))
            .unwrap();
        table
            .push_column(Column::from_strings("Age", &["70", "83"]))
            .unwrap();
        table
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(table_content_hash(&sample()), table_content_hash(&sample()));
    }

    #[test]
    fn single_cell_edit_changes_the_hash() {
        let original = sample();
        let mut edited = sample();
        edited.columns[1].values[0] = Some("71".to_string());
        assert_ne!(table_content_hash(&original), table_content_hash(&edited));
    }

    #[test]
    fn row_reordering_changes_the_hash() {
        let original = sample();
        let mut reordered = sample();
        for column in &mut reordered.columns {
            column.values.reverse();
        }
        assert_ne!(
            table_content_hash(&original),
            table_content_hash(&reordered)
        );
    }

    #[test]
    fn null_and_empty_marker_are_distinct() {
        let mut with_null = Table::new("t");
        with_null
            .push_column(Column::new("v", vec![None]))
            .unwrap();
        let mut with_value = Table::new("t");
        with_value
            .push_column(Column::new("v", vec![Some("x".to_string())]))
            .unwrap();
        assert_ne!(
            table_content_hash(&with_null),
            table_content_hash(&with_value)
        );
    }
}
