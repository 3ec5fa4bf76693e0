//! Session orchestration over the matching engine.
//!
//! This crate ties the model, matchers, and cache together: the
//! [`MatchingSession`] runs generation passes and applies review
//! mutations with undo/redo, the [`AppContext`] owns the session
//! registry and per-session cache files, and the [`WorkerPool`] runs
//! heavy passes in the background behind pollable [`TaskHandle`]s.

#![deny(unsafe_code)]

mod context;
mod export;
mod history;
mod pool;
mod session;
mod status;

pub use context::{AppContext, SharedSession};
pub use export::{ColumnMapping, ValuePair};
pub use history::{HistoryExport, OperationHistory};
pub use pool::{Deadline, TaskHandle, TimeLimitExceeded, WorkerPool};
pub use session::{MatchingSession, SessionConfig, SessionError};
pub use status::{StatusHandle, StepLog, TaskState, TaskStatus};
