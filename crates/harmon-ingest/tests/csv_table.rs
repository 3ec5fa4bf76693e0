use std::io::Write;

use harmon_ingest::read_table;
use tempfile::NamedTempFile;

#[test]
fn reads_table_from_disk_with_file_stem_name() {
    let mut file = NamedTempFile::with_suffix(".csv").unwrap();
    write!(file, "Gender,Age\nMale,70\nFemale,83\n").unwrap();
    file.flush().unwrap();

    let table = read_table(file.path()).unwrap();
    assert_eq!(table.column_names(), vec!["Gender", "Age"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(
        table.column("Gender").unwrap().unique_values(),
        vec!["Male", "Female"]
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let err = read_table(std::path::Path::new("/nonexistent/input.csv")).unwrap_err();
    assert!(err.to_string().contains("Failed to read"));
}
