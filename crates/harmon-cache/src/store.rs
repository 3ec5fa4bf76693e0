//! Two-tier cache store with atomic writes and retrying reads.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::record::CacheRecord;

/// Errors from cache persistence.
///
/// Only writes surface errors; reads degrade to "no cache".
#[derive(Debug, Error)]
pub enum CacheError {
    /// File I/O failure while writing.
    #[error("Failed to {operation} cache file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record could not be serialized.
    #[error("Failed to serialize cache record")]
    Serialize(#[from] serde_json::Error),
}

/// Retry discipline for reads that race a concurrent writer.
#[derive(Debug, Clone, Copy)]
pub struct ReadRetryPolicy {
    /// First backoff delay.
    pub initial: Duration,
    /// Backoff ceiling.
    pub cap: Duration,
    /// Total attempts before giving up.
    pub attempts: u32,
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            cap: Duration::from_secs(1),
            attempts: 7,
        }
    }
}

/// Hash-validated candidate cache with a memory tier over a JSON file.
///
/// The in-memory copy is consulted first to avoid file I/O on every
/// request within a process; both tiers use the identical validity test.
/// The file is shared across processes: writes replace the whole
/// document atomically (temp file + `sync_all` + rename), so readers
/// never observe a partial write.
pub struct CandidateCache {
    path: PathBuf,
    memory: Mutex<Option<CacheRecord>>,
    retry: ReadRetryPolicy,
}

impl CandidateCache {
    /// Creates a cache backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            memory: Mutex::new(None),
            retry: ReadRetryPolicy::default(),
        }
    }

    /// Overrides the read retry policy.
    pub fn with_retry(mut self, retry: ReadRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached record when it is valid for the given hashes
    /// and node filter; memory tier first, then disk.
    pub fn load(
        &self,
        source_hash: &str,
        target_hash: &str,
        nodes: &[String],
    ) -> Option<CacheRecord> {
        {
            let memory = self.memory.lock().expect("cache lock poisoned");
            if let Some(record) = memory.as_ref()
                && record.is_valid_for(source_hash, target_hash, nodes)
            {
                debug!("cache hit (memory)");
                return Some(record.clone());
            }
        }
        let record = self.read_record()?;
        if record.is_valid_for(source_hash, target_hash, nodes) {
            debug!("cache hit (disk)");
            let mut memory = self.memory.lock().expect("cache lock poisoned");
            *memory = Some(record.clone());
            Some(record)
        } else {
            debug!("cache record present but stale");
            None
        }
    }

    /// Reads the record from disk regardless of validity.
    ///
    /// Retries with exponential backoff on a missing, empty, or
    /// unparsable file — a writer may be mid-replace — and returns
    /// `None` after exhausting attempts rather than erroring.
    pub fn read_record(&self) -> Option<CacheRecord> {
        let mut delay = self.retry.initial;
        for attempt in 0..self.retry.attempts {
            match fs::read_to_string(&self.path) {
                Ok(contents) if !contents.trim().is_empty() => {
                    match serde_json::from_str::<CacheRecord>(&contents) {
                        Ok(record) => return Some(record),
                        Err(error) => {
                            debug!(attempt, %error, "cache parse failed, retrying");
                        }
                    }
                }
                Ok(_) => debug!(attempt, "cache file empty, retrying"),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                    debug!("no cache file present");
                    return None;
                }
                Err(error) => debug!(attempt, %error, "cache read failed, retrying"),
            }
            if attempt + 1 < self.retry.attempts {
                std::thread::sleep(delay);
                delay = (delay * 2).min(self.retry.cap);
            }
        }
        warn!(path = %self.path.display(), "cache unreadable after retries, regenerating");
        None
    }

    /// Persists the record: whole-document JSON, written to a temp file,
    /// synced, then atomically renamed over the target. The memory tier
    /// is updated on success.
    pub fn store(&self, record: &CacheRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                operation: "create directory for",
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let json = serde_json::to_string(record)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = File::create(&temp_path).map_err(|e| CacheError::Io {
            operation: "create",
            path: temp_path.clone(),
            source: e,
        })?;
        file.write_all(json.as_bytes()).map_err(|e| CacheError::Io {
            operation: "write",
            path: temp_path.clone(),
            source: e,
        })?;
        file.sync_all().map_err(|e| CacheError::Io {
            operation: "sync",
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| CacheError::Io {
            operation: "replace",
            path: self.path.clone(),
            source: e,
        })?;

        let mut memory = self.memory.lock().expect("cache lock poisoned");
        *memory = Some(record.clone());
        debug!(path = %self.path.display(), "cache stored");
        Ok(())
    }

    /// Drops the memory tier, forcing the next load to consult disk.
    pub fn clear_memory(&self) {
        let mut memory = self.memory.lock().expect("cache lock poisoned");
        *memory = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;

    fn fast_retry() -> ReadRetryPolicy {
        ReadRetryPolicy {
            initial: Duration::from_millis(1),
            cap: Duration::from_millis(2),
            attempts: 3,
        }
    }

    #[test]
    fn missing_file_is_no_cache() {
        let dir = tempdir().unwrap();
        let cache = CandidateCache::new(dir.path().join("cache.json")).with_retry(fast_retry());
        assert!(cache.read_record().is_none());
    }

    #[test]
    fn garbage_file_degrades_to_no_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();
        let cache = CandidateCache::new(path).with_retry(fast_retry());
        assert!(cache.read_record().is_none());
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache = CandidateCache::new(dir.path().join("cache.json")).with_retry(fast_retry());
        let record = CacheRecord {
            source_hash: "abc".to_string(),
            target_hash: "def".to_string(),
            ..CacheRecord::default()
        };
        cache.store(&record).unwrap();

        // Memory tier hit.
        assert_eq!(cache.load("abc", "def", &[]), Some(record.clone()));
        // Disk tier hit after dropping memory.
        cache.clear_memory();
        assert_eq!(cache.load("abc", "def", &[]), Some(record));
        // Stale for different inputs.
        assert!(cache.load("abc", "other", &[]).is_none());
    }
}
