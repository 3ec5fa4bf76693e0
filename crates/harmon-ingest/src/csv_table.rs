//! CSV loading into the in-memory table model.
//!
//! Headers and cells are trimmed and stripped of UTF-8 BOMs; empty cells
//! become missing values. Ragged rows are tolerated by padding short
//! rows with nulls.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use harmon_model::{Column, ColumnProfile, Table};

use crate::error::IngestError;

fn normalize_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    let mut parts = trimmed.split_whitespace();
    let mut normalized = String::new();
    if let Some(first) = parts.next() {
        normalized.push_str(first);
        for part in parts {
            normalized.push(' ');
            normalized.push_str(part);
        }
    }
    normalized
}

fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads a CSV file into a [`Table`] named after the file stem.
pub fn read_table(path: &Path) -> Result<Table, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table")
        .to_string();
    read_table_from_reader(file, &name)
}

/// Reads CSV content from any reader into a named [`Table`].
pub fn read_table_from_reader(reader: impl Read, name: &str) -> Result<Table, IngestError> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();
    // Empty input and a header row of blank cells both count as headerless.
    if headers.iter().all(String::is_empty) {
        return Err(IngestError::MissingHeader(name.to_string()));
    }

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut row_count = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(record.get(idx).and_then(normalize_cell));
        }
        row_count += 1;
    }

    debug!(
        table = name,
        columns = headers.len(),
        rows = row_count,
        "loaded CSV table"
    );

    let mut table = Table::new(name);
    for (header, values) in headers.into_iter().zip(columns) {
        // Duplicate headers get a positional suffix instead of erroring.
        let mut unique = header.clone();
        let mut attempt = 1;
        while table.column(&unique).is_some() {
            attempt += 1;
            unique = format!("{header}_{attempt}");
        }
        let column = Column::new(unique, values);
        table
            .push_column(column)
            .expect("column names are deduplicated");
    }
    Ok(table)
}

/// Profiles every column of a table.
pub fn profile_columns(table: &Table) -> BTreeMap<String, ColumnProfile> {
    table
        .columns
        .iter()
        .map(|c| (c.name.clone(), ColumnProfile::of(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_headers_and_missing_cells() {
        let data = "\u{feff} Gender ,Age\nMale,70\nFemale,\n";
        let table = read_table_from_reader(data.as_bytes(), "patients").unwrap();
        assert_eq!(table.column_names(), vec!["Gender", "Age"]);
        let age = table.column("Age").unwrap();
        assert_eq!(age.values, vec![Some("70".to_string()), None]);
    }

    #[test]
    fn ragged_rows_are_padded() {
        let data = "a,b,c\n1,2\n4,5,6\n";
        let table = read_table_from_reader(data.as_bytes(), "t").unwrap();
        let c = table.column("c").unwrap();
        assert_eq!(c.values, vec![None, Some("6".to_string())]);
    }

    #[test]
    fn duplicate_headers_get_suffixes() {
        let data = "x,x\n1,2\n";
        let table = read_table_from_reader(data.as_bytes(), "t").unwrap();
        assert_eq!(table.column_names(), vec!["x", "x_2"]);
    }

    #[test]
    fn headerless_input_is_rejected() {
        let err = read_table_from_reader("".as_bytes(), "t").unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader(_)));

        let err = read_table_from_reader(" , ,\n1,2,3\n".as_bytes(), "t").unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader(_)));
    }

    #[test]
    fn profiles_cover_every_column() {
        let data = "Gender,Age\nMale,70\nFemale,83\n";
        let table = read_table_from_reader(data.as_bytes(), "t").unwrap();
        let profiles = profile_columns(&table);
        assert!(profiles["Age"].is_numeric);
        assert!(!profiles["Gender"].is_numeric);
    }
}
