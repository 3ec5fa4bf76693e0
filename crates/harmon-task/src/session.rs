//! The matching session orchestrator.
//!
//! A session owns the source table, the target schema, the matcher
//! registry, and the cached candidate set. `get_candidates` drives the
//! full generation pass (hashing, cache check, node filtering,
//! clustering, quadrant classification, every matcher strategy,
//! value-match generation, weight rebuild, cache persistence); the
//! mutation API applies review decisions to the cached set in place and
//! records them in the undo/redo history.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use harmon_cache::{CacheError, CacheRecord, CandidateCache, table_content_hash};
use harmon_match::{
    EmbeddingMatcher, FuzzyNameMatcher, FuzzyValueMatcher, MatchError, MatcherStrategy,
    NgramEncoder, PluginCatalog, QuadrantClassifier, QuadrantThresholds, ValueOverlapMatcher,
    WeightUpdater, cluster_columns,
};
use harmon_model::{
    Candidate, MatchStatus, MatcherEntry, Operation, OperationKind, QUADRANT_MATCHER, Table,
    TargetOntology, ValueMatchTable,
};

use crate::history::{HistoryExport, OperationHistory};
use crate::pool::{Deadline, TimeLimitExceeded};
use crate::status::StatusHandle;

/// Value-match scores below this floor map to "no match".
const VALUE_MATCH_FLOOR: f64 = 0.5;
/// Bounded worker count for plugin reconstruction.
const PLUGIN_WORKERS: usize = 4;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required input table is absent or empty.
    #[error("Missing {0} table")]
    MissingTable(&'static str),

    /// Unknown mutation verb from an external caller.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A matcher strategy failed; the generation pass is aborted.
    #[error(transparent)]
    Matcher(#[from] MatchError),

    /// Cache persistence failed.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The background task overran its hard time limit.
    #[error(transparent)]
    TimeLimit(#[from] TimeLimitExceeded),
}

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Candidates kept per source column per matcher.
    pub top_k: usize,
    /// Quadrant thresholds.
    pub thresholds: QuadrantThresholds,
    /// Cosine threshold for source-column clustering.
    pub cluster_threshold: f64,
    /// Weight reward rate on accept.
    pub alpha: f64,
    /// Weight penalty rate on reject.
    pub beta: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            thresholds: QuadrantThresholds::default(),
            cluster_threshold: 0.85,
            alpha: 0.1,
            beta: 0.1,
        }
    }
}

/// One user's matching workspace over a (source, target) table pair.
pub struct MatchingSession {
    pub(crate) source: Table,
    pub(crate) target: Table,
    pub(crate) nodes: Vec<String>,
    pub(crate) ontology: Arc<dyn TargetOntology>,
    pub(crate) cache: CandidateCache,
    pub(crate) config: SessionConfig,
    /// Strategies in registry order; merge order follows this.
    strategies: Vec<Arc<dyn MatcherStrategy>>,
    /// Registry metadata parallel to `strategies`, registry order.
    entries: Vec<MatcherEntry>,
    /// Plugin definitions by matcher name.
    matcher_code: BTreeMap<String, String>,
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) value_matches: BTreeMap<String, ValueMatchTable>,
    source_clusters: BTreeMap<String, Vec<String>>,
    history: OperationHistory,
}

impl MatchingSession {
    /// Creates a session with the built-in matcher registry.
    pub fn new(
        source: Table,
        target: Table,
        nodes: Vec<String>,
        ontology: Arc<dyn TargetOntology>,
        cache: CandidateCache,
        config: SessionConfig,
    ) -> Self {
        let strategies: Vec<Arc<dyn MatcherStrategy>> = vec![
            Arc::new(FuzzyNameMatcher::default()),
            Arc::new(EmbeddingMatcher::default()),
            Arc::new(ValueOverlapMatcher::default()),
        ];
        let uniform = 1.0 / strategies.len() as f64;
        let entries = strategies
            .iter()
            .map(|s| MatcherEntry::new(s.name(), uniform))
            .collect();
        Self {
            source,
            target,
            nodes,
            ontology,
            cache,
            config,
            strategies,
            entries,
            matcher_code: BTreeMap::new(),
            candidates: Vec::new(),
            value_matches: BTreeMap::new(),
            source_clusters: BTreeMap::new(),
            history: OperationHistory::new(),
        }
    }

    /// Current candidate set, merge order preserved.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Registry entries with current weights, registry order.
    pub fn matchers(&self) -> &[MatcherEntry] {
        &self.entries
    }

    /// Value-match tables keyed by source column.
    pub fn value_matches(&self) -> &BTreeMap<String, ValueMatchTable> {
        &self.value_matches
    }

    /// Source-column cluster map from the last generation pass.
    pub fn source_clusters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.source_clusters
    }

    /// Serializable history export.
    pub fn history(&self) -> HistoryExport {
        self.history.export()
    }

    /// Replaces the node filter, invalidating cached candidates on the
    /// next `get_candidates` call (filters are a generation input).
    pub fn set_nodes(&mut self, nodes: Vec<String>) {
        if self.nodes != nodes {
            self.nodes = nodes;
            self.cache.clear_memory();
        }
    }

    /// Runs or reuses a full generation pass and returns the merged
    /// candidate list.
    ///
    /// Always rebuilds the weight updater from the current registry and
    /// candidate set, and persists the cache, whether or not the cached
    /// record was reused.
    pub fn get_candidates(
        &mut self,
        status: &StatusHandle,
        deadline: &Deadline,
    ) -> Result<Vec<Candidate>, SessionError> {
        if self.source.columns.is_empty() {
            return Err(SessionError::MissingTable("source"));
        }
        if self.target.columns.is_empty() {
            return Err(SessionError::MissingTable("target"));
        }

        status.begin_step("hashing", 5);
        let source_hash = table_content_hash(&self.source);
        let target_hash = table_content_hash(&self.target);
        deadline.check(status)?;

        status.begin_step("cache-check", 10);
        if let Some(record) = self.cache.load(&source_hash, &target_hash, &self.nodes) {
            info!(candidates = record.candidates.len(), "using cached candidates");
            status.log("using cached candidates");
            self.adopt_record(record);
            self.restore_plugins(status);
        } else {
            self.generate(status, deadline)?;
        }

        status.begin_step("weight-update", 90);
        let mut updater = WeightUpdater::new(
            self.entries.clone(),
            &self.candidates,
            self.config.alpha,
            self.config.beta,
        );
        updater.normalize(false);
        self.sync_weights(&updater);
        self.persist(&source_hash, &target_hash)?;
        Ok(self.candidates.clone())
    }

    /// The heavy path: clustering, quadrants, every matcher, value
    /// matches. Candidate merge order is quadrant easy matches first,
    /// then each strategy in registry order; no cross-matcher dedup.
    fn generate(
        &mut self,
        status: &StatusHandle,
        deadline: &Deadline,
    ) -> Result<(), SessionError> {
        status.begin_step("filtering", 15);
        let filtered_target = self.filtered_target();
        deadline.check(status)?;

        status.begin_step("embeddings", 25);
        status.begin_step("clustering", 35);
        self.source_clusters = cluster_columns(
            &self.source,
            &NgramEncoder::default(),
            self.config.cluster_threshold,
        );
        deadline.check(status)?;

        status.begin_step("quadrants", 45);
        let classifier = QuadrantClassifier::new(
            self.source.clone(),
            filtered_target.clone(),
            self.config.top_k,
            self.config.thresholds,
        );
        let mut merged = classifier.easy_candidates();
        deadline.check(status)?;

        status.begin_step("matchers", 55);
        for strategy in &self.strategies {
            // A strategy error aborts the whole pass; isolate the call
            // so a skip-and-continue policy stays a localized change.
            let found = strategy.top_matches(&self.source, &filtered_target, self.config.top_k)?;
            debug!(matcher = strategy.name(), candidates = found.len(), "merged matcher output");
            merged.extend(found);
        }
        deadline.check(status)?;

        status.begin_step("value-matches", 70);
        self.value_matches.clear();
        let pairs: Vec<(String, String)> = merged
            .iter()
            .map(|c| (c.source_column.clone(), c.target_column.clone()))
            .collect();
        let total = pairs.len();
        for (index, (source_column, target_column)) in pairs.into_iter().enumerate() {
            self.generate_value_match(&source_column, &target_column);
            status.replace_last(70, format!("value matches {}/{total}", index + 1));
        }
        deadline.check(status)?;

        self.candidates = merged;
        Ok(())
    }

    /// Target table restricted to the current node filter.
    ///
    /// A filter that matches no described column yields an empty
    /// target, so generation finds nothing rather than silently
    /// matching against the whole schema.
    fn filtered_target(&self) -> Table {
        if self.nodes.is_empty() {
            return self.target.clone();
        }
        let names = self
            .ontology
            .columns_in_nodes(&self.target.column_names(), &self.nodes);
        self.target.project(&names)
    }

    fn adopt_record(&mut self, record: CacheRecord) {
        self.candidates = record.candidates;
        self.value_matches = record.value_matches;
        self.source_clusters = record.source_clusters;
        self.matcher_code = record.matcher_code;
        if !record.matchers.is_empty() {
            self.entries = record.matchers;
        }
    }

    /// Rebuilds runtime-registered strategies from persisted
    /// definitions, in parallel across a bounded worker set (each
    /// reconstruction is independent).
    fn restore_plugins(&mut self, status: &StatusHandle) {
        let pending: Vec<(String, String, BTreeMap<String, String>)> = self
            .matcher_code
            .iter()
            .filter(|(name, _)| !self.strategies.iter().any(|s| s.name() == name.as_str()))
            .map(|(name, code)| {
                let params = self
                    .entries
                    .iter()
                    .find(|e| &e.name == name)
                    .map(|e| e.params.clone())
                    .unwrap_or_default();
                (name.clone(), code.clone(), params)
            })
            .collect();
        if pending.is_empty() {
            return;
        }
        status.log(format!("restoring {} plugin matchers", pending.len()));

        let catalog = PluginCatalog::builtin();
        let mut built: Vec<(String, Result<Arc<dyn MatcherStrategy>, String>)> = Vec::new();
        for chunk in pending.chunks(PLUGIN_WORKERS) {
            let results: Vec<(String, Result<Arc<dyn MatcherStrategy>, String>)> =
                std::thread::scope(|scope| {
                    let handles: Vec<_> = chunk
                        .iter()
                        .map(|(name, code, params)| {
                            let catalog = &catalog;
                            scope.spawn(move || (name.clone(), catalog.register(name, code, params)))
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|h| h.join().expect("plugin worker panicked"))
                        .collect()
                });
            built.extend(results);
        }

        for (name, result) in built {
            match result {
                Ok(strategy) => {
                    if !self.entries.iter().any(|e| e.name == name) {
                        self.entries.push(MatcherEntry::new(name.clone(), 0.0));
                    }
                    self.strategies.push(strategy);
                }
                Err(error) => warn!(matcher = %name, %error, "failed to restore plugin matcher"),
            }
        }
    }

    fn sync_weights(&mut self, updater: &WeightUpdater) {
        for entry in &mut self.entries {
            if let Some(weight) = updater.weight(&entry.name) {
                entry.weight = weight;
            }
        }
    }

    fn persist(&self, source_hash: &str, target_hash: &str) -> Result<(), CacheError> {
        let record = CacheRecord {
            source_hash: source_hash.to_string(),
            target_hash: target_hash.to_string(),
            candidates: self.candidates.clone(),
            source_clusters: self.source_clusters.clone(),
            value_matches: self.value_matches.clone(),
            matchers: self.entries.clone(),
            matcher_code: self.matcher_code.clone(),
            nodes: self.nodes.clone(),
        };
        self.cache.store(&record)
    }

    fn persist_current(&self) -> Result<(), CacheError> {
        let source_hash = table_content_hash(&self.source);
        let target_hash = table_content_hash(&self.target);
        self.persist(&source_hash, &target_hash)
    }

    /// Status of the first cached row matching the pair.
    fn pair_status(&self, source: &str, target: &str) -> Option<MatchStatus> {
        self.candidates
            .iter()
            .find(|c| c.is_pair(source, target))
            .map(|c| c.status)
    }

    fn set_pair_status(&mut self, source: &str, target: &str, status: MatchStatus) {
        for candidate in &mut self.candidates {
            if candidate.is_pair(source, target) {
                candidate.status = status;
            }
        }
    }

    /// Dispatches a mutation by verb name; unknown verbs error.
    pub fn mutate(&mut self, verb: &str, candidate: &Candidate) -> Result<(), SessionError> {
        match verb {
            "accept" => self.accept(candidate),
            "reject" => self.reject(candidate),
            "discard" => self.discard(&candidate.source_column),
            other => Err(SessionError::UnsupportedOperation(other.to_string())),
        }
    }

    /// Accepts a pair: status set on every cached row sharing
    /// (source, target), matcher weights credited, operation recorded.
    pub fn accept(&mut self, candidate: &Candidate) -> Result<(), SessionError> {
        self.review(OperationKind::Accept, candidate, MatchStatus::Accepted)
    }

    /// Rejects a pair; the mirror of [`MatchingSession::accept`].
    pub fn reject(&mut self, candidate: &Candidate) -> Result<(), SessionError> {
        self.review(OperationKind::Reject, candidate, MatchStatus::Rejected)
    }

    fn review(
        &mut self,
        kind: OperationKind,
        candidate: &Candidate,
        new_status: MatchStatus,
    ) -> Result<(), SessionError> {
        let source = candidate.source_column.clone();
        let target = candidate.target_column.clone();
        // Weight update sees the pre-mutation candidate set.
        let mut updater = WeightUpdater::new(
            self.entries.clone(),
            &self.candidates,
            self.config.alpha,
            self.config.beta,
        );
        updater.update(kind, &source, &target);
        self.sync_weights(&updater);

        let mut stored = candidate.clone();
        stored.status = self
            .pair_status(&source, &target)
            .unwrap_or(candidate.status);
        self.history.push(Operation::new(kind, stored));

        self.set_pair_status(&source, &target, new_status);
        self.persist_current()?;
        Ok(())
    }

    /// Discards every candidate of a source column at once.
    pub fn discard(&mut self, source_column: &str) -> Result<(), SessionError> {
        let references: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| c.source_column == source_column)
            .cloned()
            .collect();
        let marker = Candidate::new(source_column, "", 0.0, "");
        self.history
            .push(Operation::with_references(OperationKind::Discard, marker, references));

        for candidate in &mut self.candidates {
            if candidate.source_column == source_column {
                candidate.status = MatchStatus::Discarded;
            }
        }
        self.persist_current()?;
        Ok(())
    }

    /// Appends candidates for a source column (typically
    /// agent-suggested).
    ///
    /// Accepted pairs are protected: an append over an accepted pair is
    /// a no-op for that pair. Existing non-accepted entries are
    /// replaced. Value matches are generated for new targets.
    pub fn append(
        &mut self,
        source_column: &str,
        candidates: Vec<Candidate>,
        from_agent: bool,
    ) -> Result<(), SessionError> {
        let mut applied = Vec::new();
        for mut incoming in candidates {
            incoming.source_column = source_column.to_string();
            let target = incoming.target_column.clone();
            match self.pair_status(source_column, &target) {
                Some(MatchStatus::Accepted) => {
                    debug!(source = source_column, %target, "append skipped accepted pair");
                    continue;
                }
                Some(_) => {
                    self.candidates
                        .retain(|c| !c.is_pair(source_column, &target));
                }
                None => {}
            }
            self.generate_value_match(source_column, &target);
            self.candidates.push(incoming.clone());
            applied.push(incoming);
        }

        let marker = Candidate::new(source_column, "", 0.0, "");
        let mut operation =
            Operation::with_references(OperationKind::Append, marker, applied);
        operation.is_match_to_agent = Some(from_agent);
        self.history.push(operation);
        self.persist_current()?;
        Ok(())
    }

    /// Removes the given (source, target) pairs entirely.
    pub fn prune(
        &mut self,
        source_column: &str,
        candidates: &[Candidate],
    ) -> Result<(), SessionError> {
        let mut removed = Vec::new();
        for reference in candidates {
            let target = &reference.target_column;
            let mut kept = Vec::with_capacity(self.candidates.len());
            for candidate in self.candidates.drain(..) {
                if candidate.is_pair(source_column, target) {
                    removed.push(candidate);
                } else {
                    kept.push(candidate);
                }
            }
            self.candidates = kept;
        }

        let marker = Candidate::new(source_column, "", 0.0, "");
        self.history
            .push(Operation::with_references(OperationKind::Prune, marker, removed));
        self.persist_current()?;
        Ok(())
    }

    /// Undoes the most recent operation; false when history is empty.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        let Some(operation) = self.history.pop_undo() else {
            return Ok(false);
        };
        match operation.operation {
            OperationKind::Accept | OperationKind::Reject => {
                // Restore the status captured when the operation was
                // recorded, not a recomputed one.
                self.set_pair_status(
                    &operation.candidate.source_column,
                    &operation.candidate.target_column,
                    operation.candidate.status,
                );
            }
            OperationKind::Discard => {
                let column = &operation.candidate.source_column;
                for candidate in &mut self.candidates {
                    if &candidate.source_column == column {
                        candidate.status = if candidate.matcher == QUADRANT_MATCHER {
                            MatchStatus::Accepted
                        } else {
                            MatchStatus::Idle
                        };
                    }
                }
            }
            OperationKind::Append => {
                for reference in &operation.references {
                    self.candidates.retain(|c| {
                        !c.is_pair(&reference.source_column, &reference.target_column)
                    });
                }
            }
            OperationKind::Prune => {
                self.candidates.extend(operation.references.iter().cloned());
            }
        }
        self.persist_current()?;
        Ok(true)
    }

    /// Replays the most recently undone operation; false when the redo
    /// stack is empty.
    pub fn redo(&mut self) -> Result<bool, SessionError> {
        let Some(operation) = self.history.pop_redo() else {
            return Ok(false);
        };
        match operation.operation {
            OperationKind::Accept => self.set_pair_status(
                &operation.candidate.source_column,
                &operation.candidate.target_column,
                MatchStatus::Accepted,
            ),
            OperationKind::Reject => self.set_pair_status(
                &operation.candidate.source_column,
                &operation.candidate.target_column,
                MatchStatus::Rejected,
            ),
            OperationKind::Discard => {
                let column = operation.candidate.source_column.clone();
                for candidate in &mut self.candidates {
                    if candidate.source_column == column {
                        candidate.status = MatchStatus::Discarded;
                    }
                }
            }
            OperationKind::Append => {
                for reference in &operation.references {
                    let source = reference.source_column.clone();
                    let target = reference.target_column.clone();
                    match self.pair_status(&source, &target) {
                        Some(MatchStatus::Accepted) => continue,
                        Some(_) => self
                            .candidates
                            .retain(|c| !c.is_pair(&source, &target)),
                        None => {}
                    }
                    self.candidates.push(reference.clone());
                }
            }
            OperationKind::Prune => {
                for reference in &operation.references {
                    self.candidates.retain(|c| {
                        !c.is_pair(&reference.source_column, &reference.target_column)
                    });
                }
            }
        }
        self.persist_current()?;
        Ok(true)
    }

    /// Registers a runtime matcher from a catalog definition, runs it
    /// once against current data, and merges its output.
    ///
    /// Failures are returned as descriptive strings; the registry,
    /// candidate set, and cache are left unmodified on any failure.
    pub fn register_matcher(
        &mut self,
        name: &str,
        code: &str,
        params: BTreeMap<String, String>,
    ) -> Result<Vec<MatcherEntry>, String> {
        if self.entries.iter().any(|e| e.name == name) {
            return Err(format!("matcher '{name}' is already registered"));
        }
        let catalog = PluginCatalog::builtin();
        let strategy = catalog.register(name, code, &params)?;

        let filtered_target = self.filtered_target();
        let found = strategy
            .top_matches(&self.source, &filtered_target, self.config.top_k)
            .map_err(|e| format!("matcher '{name}' failed its first run: {e}"))?;

        // Commit only after the first run succeeded.
        let uniform = 1.0 / (self.entries.len() as f64 + 1.0);
        let mut entry = MatcherEntry::new(name, uniform);
        entry.params = params;
        entry.code = Some(code.to_string());
        self.entries.push(entry);
        self.strategies.push(strategy);
        self.matcher_code.insert(name.to_string(), code.to_string());

        let pairs: Vec<(String, String)> = found
            .iter()
            .map(|c| (c.source_column.clone(), c.target_column.clone()))
            .collect();
        self.candidates.extend(found);
        for (source, target) in pairs {
            self.generate_value_match(&source, &target);
        }

        let mut updater = WeightUpdater::new(
            self.entries.clone(),
            &self.candidates,
            self.config.alpha,
            self.config.beta,
        );
        updater.normalize(false);
        self.sync_weights(&updater);

        if let Err(error) = self.persist_current() {
            warn!(%error, "cache write failed after matcher registration");
        }
        info!(matcher = name, "registered and ran new matcher");
        Ok(self.entries.clone())
    }

    /// Generates the value-match table entry for a pair.
    ///
    /// No-op when the target already has an entry; skipped entirely
    /// when the source column has no unique values. The target value
    /// universe is the ontology enum when present, otherwise the target
    /// column's observed unique values.
    pub(crate) fn generate_value_match(&mut self, source_column: &str, target_column: &str) {
        let Some(column) = self.source.column(source_column) else {
            return;
        };
        let uniques = column.unique_values();
        if uniques.is_empty() {
            debug!(source = source_column, "no unique values, skipping value matches");
            return;
        }
        if self
            .value_matches
            .get(source_column)
            .is_some_and(|t| t.has_target(target_column))
        {
            return;
        }

        let universe = self
            .ontology
            .describe(target_column)
            .and_then(|d| d.enum_values)
            .or_else(|| self.target.column(target_column).map(|c| c.unique_values()))
            .unwrap_or_default();

        let matched = if universe.is_empty() {
            vec![String::new(); uniques.len()]
        } else {
            let matcher = FuzzyValueMatcher::default();
            let entries = matcher.top_value_matches(&uniques, &universe, usize::MAX);
            let best: BTreeMap<&str, (&str, f64)> = entries
                .iter()
                .map(|e| (e.source_value.as_str(), (e.target_value.as_str(), e.score)))
                .collect();
            uniques
                .iter()
                .map(|value| match best.get(value.as_str()) {
                    Some((target_value, score)) if *score >= VALUE_MATCH_FLOOR => {
                        (*target_value).to_string()
                    }
                    _ => String::new(),
                })
                .collect()
        };

        let table = self
            .value_matches
            .entry(source_column.to_string())
            .or_insert_with(|| ValueMatchTable::new(uniques));
        // A stale cached table can disagree with the current column's
        // unique values; skip rather than store a misaligned list.
        if let Err(error) = table.insert_target(target_column, matched) {
            warn!(
                source = source_column,
                target = target_column,
                %error,
                "skipping misaligned value matches"
            );
        }
    }

    /// Sets a user alias for a source value; false when unknown.
    pub fn set_value_alias(&mut self, source_column: &str, value: &str, alias: &str) -> bool {
        self.value_matches
            .get_mut(source_column)
            .is_some_and(|t| t.set_alias(value, alias))
    }
}
