use std::time::Duration;

use harmon_cache::{CacheRecord, CandidateCache, ReadRetryPolicy, table_content_hash};
use harmon_model::{Candidate, Column, Table};
use tempfile::tempdir;

fn sample_table() -> Table {
    let mut table = Table::new("patients");
    table
        .push_column(Column::from_strings("Gender", &["Male", "Female"]))
        .unwrap();
    table
        .push_column(Column::from_strings("Age", &["70", "83"]))
        .unwrap();
    table
}

fn fast_retry() -> ReadRetryPolicy {
    ReadRetryPolicy {
        initial: Duration::from_millis(1),
        cap: Duration::from_millis(2),
        attempts: 3,
    }
}

#[test]
fn round_trip_preserves_hashes_and_candidates() {
    let dir = tempdir().unwrap();
    let cache = CandidateCache::new(dir.path().join("cache.json")).with_retry(fast_retry());

    let source = sample_table();
    let source_hash = table_content_hash(&source);
    let target_hash = table_content_hash(&sample_table());
    let record = CacheRecord {
        source_hash: source_hash.clone(),
        target_hash: target_hash.clone(),
        candidates: vec![
            Candidate::easy("Gender", "gender"),
            Candidate::new("Age", "age", 0.95, "fuzzy_name"),
        ],
        nodes: vec!["demographic".to_string()],
        ..CacheRecord::default()
    };
    cache.store(&record).unwrap();
    cache.clear_memory();

    let loaded = cache
        .load(&source_hash, &target_hash, &["demographic".to_string()])
        .unwrap();
    assert_eq!(loaded.source_hash, source_hash);
    assert_eq!(loaded.target_hash, target_hash);
    assert_eq!(loaded.candidates, record.candidates);
}

#[test]
fn editing_one_cell_invalidates_the_cache() {
    let dir = tempdir().unwrap();
    let cache = CandidateCache::new(dir.path().join("cache.json")).with_retry(fast_retry());

    let source = sample_table();
    let record = CacheRecord {
        source_hash: table_content_hash(&source),
        target_hash: "target".to_string(),
        ..CacheRecord::default()
    };
    cache.store(&record).unwrap();

    let mut edited = sample_table();
    edited.columns[0].values[0] = Some("Other".to_string());
    let edited_hash = table_content_hash(&edited);
    assert_ne!(edited_hash, record.source_hash);
    assert!(cache.load(&edited_hash, "target", &[]).is_none());
}

#[test]
fn changing_the_node_filter_invalidates_the_cache() {
    let dir = tempdir().unwrap();
    let cache = CandidateCache::new(dir.path().join("cache.json")).with_retry(fast_retry());
    let record = CacheRecord {
        source_hash: "s".to_string(),
        target_hash: "t".to_string(),
        nodes: vec!["demographic".to_string()],
        ..CacheRecord::default()
    };
    cache.store(&record).unwrap();
    assert!(cache.load("s", "t", &["demographic".to_string()]).is_some());
    assert!(cache.load("s", "t", &["follow_up".to_string()]).is_none());
    assert!(cache.load("s", "t", &[]).is_none());
}
