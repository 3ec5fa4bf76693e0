//! End-to-end session tests: generation, review mutations, undo/redo,
//! cache reuse, and runtime matcher registration.

use std::collections::BTreeMap;

use tempfile::tempdir;

use harmon_model::{
    Candidate, Column, MatchStatus, QUADRANT_MATCHER, Table, reference_dictionary,
};
use harmon_task::{AppContext, SessionConfig, SessionError, SharedSession};

fn source_table() -> Table {
    let mut table = Table::new("patients");
    table
        .push_column(Column::from_strings(
            "Gender",
            &["Male", "Female", "Female", "Male"],
        ))
        .unwrap();
    table
        .push_column(Column::from_strings("Age", &["70", "34", "51", "62"]))
        .unwrap();
    table
        .push_column(Column::from_strings(
            "free_text_notes",
            &["lorem", "ipsum", "dolor", "sit"],
        ))
        .unwrap();
    table
}

fn open_and_generate(context: &AppContext, id: &str) -> SharedSession {
    let session = context.open_session(
        id,
        source_table(),
        None,
        Vec::new(),
        SessionConfig::default(),
    );
    let handle = context.spawn_generation(&session);
    handle.wait().expect("generation failed");
    session
}

fn find_pair(session: &SharedSession, source: &str, target: &str) -> Candidate {
    let session = session.lock().unwrap();
    session
        .candidates()
        .iter()
        .find(|c| c.is_pair(source, target))
        .cloned()
        .unwrap_or_else(|| panic!("no candidate for {source} -> {target}"))
}

#[test]
fn generation_auto_accepts_easy_matches_and_ranks_the_rest() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");

    let guard = session.lock().unwrap();
    let easy = guard
        .candidates()
        .iter()
        .find(|c| c.is_pair("Gender", "gender") && c.matcher == QUADRANT_MATCHER)
        .expect("quadrant classifier should auto-match Gender");
    assert_eq!(easy.status, MatchStatus::Accepted);
    assert!((easy.score - 1.0).abs() < 1e-9);

    // The fuzzy matcher contributes ranked suggestions alongside.
    assert!(
        guard
            .candidates()
            .iter()
            .any(|c| c.matcher == "fuzzy_name" && c.source_column == "Age")
    );

    // Weights stay normalized after the pass.
    let total: f64 = guard.matchers().iter().map(|m| m.weight).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn node_filter_restricts_target_columns() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = context.open_session(
        "s1",
        source_table(),
        None,
        vec!["follow_up".to_string()],
        SessionConfig::default(),
    );
    let handle = context.spawn_generation(&session);
    let candidates = handle.wait().expect("generation failed");

    assert!(!candidates.is_empty());
    assert!(
        candidates
            .iter()
            .all(|c| c.target_column == "vital_status" || c.target_column == "days_to_death"),
        "only follow_up columns may appear as targets"
    );
}

#[test]
fn unmatched_node_filter_yields_no_candidates() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = context.open_session(
        "s1",
        source_table(),
        None,
        vec!["no_such_node".to_string()],
        SessionConfig::default(),
    );
    let handle = context.spawn_generation(&session);
    let candidates = handle.wait().expect("generation failed");
    assert!(
        candidates.is_empty(),
        "a filter matching nothing must not fall back to the full schema"
    );
}

#[test]
fn value_matches_follow_the_dictionary_enum() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");

    let mut guard = session.lock().unwrap();
    let table = guard
        .value_matches()
        .get("Gender")
        .expect("value matches generated for Gender");
    assert_eq!(table.source_unique_values, vec!["Male", "Female"]);
    let matched = &table.targets["gender"];
    assert_eq!(matched, &vec!["male".to_string(), "female".to_string()]);

    assert!(guard.set_value_alias("Gender", "Male", "M"));
    assert!(!guard.set_value_alias("Gender", "Other", "O"));
}

#[test]
fn accept_undo_redo_round_trips_status() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let candidate = find_pair(&session, "Age", "age");
    assert_eq!(candidate.status, MatchStatus::Idle);

    let mut guard = session.lock().unwrap();
    guard.accept(&candidate).unwrap();
    let rows: Vec<_> = guard
        .candidates()
        .iter()
        .filter(|c| c.is_pair("Age", "age"))
        .collect();
    assert!(rows.len() >= 2, "several matchers proposed the pair");
    assert!(
        rows.iter().all(|c| c.status == MatchStatus::Accepted),
        "every row of the pair flips regardless of matcher"
    );

    assert!(guard.undo().unwrap());
    assert!(
        guard
            .candidates()
            .iter()
            .filter(|c| c.is_pair("Age", "age"))
            .all(|c| c.status == MatchStatus::Idle)
    );

    assert!(guard.redo().unwrap());
    assert!(
        guard
            .candidates()
            .iter()
            .filter(|c| c.is_pair("Age", "age"))
            .all(|c| c.status == MatchStatus::Accepted)
    );

    // Nothing left to redo, and a fresh mutation clears the stack.
    assert!(!guard.redo().unwrap());
}

#[test]
fn discard_undo_restores_quadrant_rows_to_accepted() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");

    let mut guard = session.lock().unwrap();
    guard.discard("Gender").unwrap();
    assert!(
        guard
            .candidates()
            .iter()
            .filter(|c| c.source_column == "Gender")
            .all(|c| c.status == MatchStatus::Discarded)
    );

    assert!(guard.undo().unwrap());
    for candidate in guard.candidates().iter().filter(|c| c.source_column == "Gender") {
        let expected = if candidate.matcher == QUADRANT_MATCHER {
            MatchStatus::Accepted
        } else {
            MatchStatus::Idle
        };
        assert_eq!(candidate.status, expected, "matcher {}", candidate.matcher);
    }
}

#[test]
fn append_protects_accepted_pairs() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let candidate = find_pair(&session, "Age", "age");

    let mut guard = session.lock().unwrap();
    guard.accept(&candidate).unwrap();

    let suggestions = vec![
        Candidate::new("Age", "age", 0.95, "agent"),
        Candidate::new("Age", "days_to_death", 0.8, "agent"),
    ];
    guard.append("Age", suggestions, true).unwrap();

    // The accepted pair was not replaced by the agent row.
    assert!(
        !guard
            .candidates()
            .iter()
            .any(|c| c.is_pair("Age", "age") && c.matcher == "agent")
    );
    assert!(
        guard
            .candidates()
            .iter()
            .all(|c| !c.is_pair("Age", "age") || c.status == MatchStatus::Accepted)
    );
    // The non-accepted pair was replaced by the single agent row.
    let death_rows: Vec<_> = guard
        .candidates()
        .iter()
        .filter(|c| c.is_pair("Age", "days_to_death"))
        .collect();
    assert_eq!(death_rows.len(), 1);
    assert_eq!(death_rows[0].matcher, "agent");

    assert!(guard.undo().unwrap());
    assert!(
        !guard
            .candidates()
            .iter()
            .any(|c| c.matcher == "agent"),
        "undo removes appended rows"
    );
}

#[test]
fn prune_undo_restores_removed_rows() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let reference = find_pair(&session, "Gender", "race");

    let mut guard = session.lock().unwrap();
    let before = guard
        .candidates()
        .iter()
        .filter(|c| c.is_pair("Gender", "race"))
        .count();
    assert!(before > 0);

    guard.prune("Gender", std::slice::from_ref(&reference)).unwrap();
    assert!(!guard.candidates().iter().any(|c| c.is_pair("Gender", "race")));

    assert!(guard.undo().unwrap());
    let after = guard
        .candidates()
        .iter()
        .filter(|c| c.is_pair("Gender", "race"))
        .count();
    assert_eq!(after, before);
}

#[test]
fn rerun_reuses_the_cache_and_keeps_review_state() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let candidate = find_pair(&session, "Age", "age");
    session.lock().unwrap().accept(&candidate).unwrap();

    let handle = context.spawn_generation(&session);
    let rerun = handle.wait().expect("cached rerun failed");
    assert!(
        rerun
            .iter()
            .filter(|c| c.is_pair("Age", "age"))
            .all(|c| c.status == MatchStatus::Accepted),
        "review decisions survive a cached rerun"
    );

    // A fresh session over the same inputs resumes from the disk cache.
    let reopened = context.open_session(
        "s1",
        source_table(),
        None,
        Vec::new(),
        SessionConfig::default(),
    );
    let handle = context.spawn_generation(&reopened);
    let resumed = handle.wait().expect("resume failed");
    assert!(
        resumed
            .iter()
            .filter(|c| c.is_pair("Age", "age"))
            .all(|c| c.status == MatchStatus::Accepted)
    );
}

#[test]
fn register_matcher_runs_it_once_and_merges() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");

    let mut guard = session.lock().unwrap();
    let entries = guard
        .register_matcher(
            "strict_fuzzy",
            "define strict_fuzzy = fuzzy(threshold=0.9)",
            BTreeMap::new(),
        )
        .unwrap();
    assert!(entries.iter().any(|e| e.name == "strict_fuzzy"));
    let total: f64 = entries.iter().map(|e| e.weight).sum();
    assert!((total - 1.0).abs() < 1e-9);

    // It ran immediately: only near-identical names clear 0.9.
    assert!(
        guard
            .candidates()
            .iter()
            .any(|c| c.matcher == "strict_fuzzy" && c.is_pair("Gender", "gender"))
    );

    let duplicate = guard.register_matcher(
        "strict_fuzzy",
        "define strict_fuzzy = fuzzy()",
        BTreeMap::new(),
    );
    assert!(duplicate.unwrap_err().contains("already registered"));

    let value_only = guard.register_matcher(
        "values_only",
        "define values_only = fuzzy_value()",
        BTreeMap::new(),
    );
    assert!(value_only.unwrap_err().contains("top_matches"));
}

#[test]
fn unknown_mutation_verb_is_rejected() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let candidate = find_pair(&session, "Age", "age");

    let mut guard = session.lock().unwrap();
    let error = guard.mutate("promote", &candidate).unwrap_err();
    assert!(matches!(error, SessionError::UnsupportedOperation(verb) if verb == "promote"));
}

#[test]
fn exports_cover_accepted_pairs_with_aliased_values() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let session = open_and_generate(&context, "s1");
    let candidate = find_pair(&session, "Age", "age");

    let mut guard = session.lock().unwrap();
    guard.accept(&candidate).unwrap();
    assert!(guard.set_value_alias("Gender", "Male", "M"));

    let table = guard.accepted_table("harmonized");
    assert!(table.column("gender").is_some());
    assert_eq!(
        table.column("age").unwrap().values,
        vec![
            Some("70".to_string()),
            Some("34".to_string()),
            Some("51".to_string()),
            Some("62".to_string()),
        ]
    );

    let mapping = guard.accepted_mapping();
    let gender = mapping
        .iter()
        .find(|m| m.source_column == "Gender" && m.target_column == "gender")
        .expect("auto-accepted pair exported");
    assert!(
        gender
            .value_matches
            .iter()
            .any(|p| p.from == "M" && p.to == "male"),
        "aliases flow into the exported value pairs"
    );
    let json = serde_json::to_string(&mapping).unwrap();
    assert!(json.contains("\"sourceColumn\":\"Gender\""));
}

#[test]
fn closing_a_session_removes_it_from_the_registry() {
    let dir = tempdir().unwrap();
    let context = AppContext::new(dir.path(), reference_dictionary());
    let _ = open_and_generate(&context, "s1");
    assert!(context.session("s1").is_some());
    assert!(context.close_session("s1"));
    assert!(!context.close_session("s1"));
    assert!(context.session("s1").is_none());
    context.shutdown();
}
