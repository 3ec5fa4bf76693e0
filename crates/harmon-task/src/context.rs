//! Application context: session registry, worker pool, cache layout.
//!
//! Lifetimes are explicit. The context is constructed once at startup
//! and torn down with [`AppContext::shutdown`]; nothing is initialized
//! behind a global. Each session gets its own cache file under the
//! context's cache directory so concurrent sessions never contend on
//! one document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use harmon_cache::CandidateCache;
use harmon_model::{Candidate, InMemoryOntology, Table, TargetOntology};

use crate::pool::{TaskHandle, WorkerPool};
use crate::session::{MatchingSession, SessionConfig};

/// Steps reported by a full generation pass.
const GENERATION_STEPS: usize = 9;

/// A session behind its coarse lock.
///
/// Every session operation, including a full generation pass, holds
/// this lock; mutations and generation for one session serialize,
/// while distinct sessions proceed independently.
pub type SharedSession = Arc<Mutex<MatchingSession>>;

/// Long-lived application state shared across sessions.
pub struct AppContext {
    cache_dir: PathBuf,
    ontology: Arc<InMemoryOntology>,
    pool: WorkerPool,
    sessions: Mutex<BTreeMap<String, SharedSession>>,
}

impl AppContext {
    /// Creates a context over a cache directory and target dictionary.
    pub fn new(cache_dir: impl Into<PathBuf>, ontology: InMemoryOntology) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ontology: Arc::new(ontology),
            pool: WorkerPool::default(),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Overrides the worker pool (custom time limits).
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Directory holding per-session cache files.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The target dictionary.
    pub fn ontology(&self) -> &InMemoryOntology {
        &self.ontology
    }

    /// Cache file for a session id.
    pub fn cache_path(&self, session_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{session_id}.json"))
    }

    /// Opens (or replaces) a session.
    ///
    /// When no target table is given, one is synthesized from the
    /// dictionary so matching runs against the reference schema
    /// directly.
    pub fn open_session(
        &self,
        session_id: &str,
        source: Table,
        target: Option<Table>,
        nodes: Vec<String>,
        config: SessionConfig,
    ) -> SharedSession {
        let target = target.unwrap_or_else(|| self.ontology.to_table("reference"));
        let cache = CandidateCache::new(self.cache_path(session_id));
        // The annotated binding unsizes Arc<InMemoryOntology> into the
        // trait object the session stores.
        let ontology: Arc<dyn TargetOntology> = self.ontology.clone();
        let session = MatchingSession::new(source, target, nodes, ontology, cache, config);
        let shared: SharedSession = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.insert(session_id.to_string(), Arc::clone(&shared));
        info!(session = session_id, "session opened");
        shared
    }

    /// Looks up an open session by id.
    pub fn session(&self, session_id: &str) -> Option<SharedSession> {
        let sessions = self.sessions.lock().expect("session registry poisoned");
        sessions.get(session_id).cloned()
    }

    /// Closes a session; false when unknown. Cache files stay on disk
    /// so a reopened session resumes from its persisted candidates.
    pub fn close_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let removed = sessions.remove(session_id).is_some();
        if removed {
            info!(session = session_id, "session closed");
        }
        removed
    }

    /// Runs a full generation pass for the session in the background.
    ///
    /// Returns immediately; poll the handle for step progress and
    /// collect the merged candidates when it completes.
    pub fn spawn_generation(&self, session: &SharedSession) -> TaskHandle<Vec<Candidate>> {
        let session = Arc::clone(session);
        self.pool.spawn(GENERATION_STEPS, move |status, deadline| {
            let mut session = session.lock().map_err(|_| "session lock poisoned".to_string())?;
            session
                .get_candidates(status, deadline)
                .map_err(|e| e.to_string())
        })
    }

    /// Explicit teardown: drops every session registration.
    pub fn shutdown(&self) {
        let mut sessions = self.sessions.lock().expect("session registry poisoned");
        let count = sessions.len();
        sessions.clear();
        info!(sessions = count, "context shut down");
    }
}
