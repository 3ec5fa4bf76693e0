//! Content-hash-validated candidate cache.
//!
//! The cache makes a full multi-matcher generation pass skippable when
//! neither input table nor the node filter changed. A record is keyed by
//! the SHA-256 content hashes of both tables plus the exact node list;
//! it is persisted as a whole JSON document with atomic replace-on-write
//! and read back with a bounded retry/backoff loop that degrades to
//! "no cache" instead of failing.

#![deny(unsafe_code)]

mod hash;
mod record;
mod store;

pub use hash::table_content_hash;
pub use record::CacheRecord;
pub use store::{CacheError, CandidateCache, ReadRetryPolicy};
