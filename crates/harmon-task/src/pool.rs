//! Background execution with polled task handles.
//!
//! Heavy operations (full candidate generation, new-matcher execution)
//! run on spawned worker threads; callers poll the [`TaskHandle`] rather
//! than blocking. A [`Deadline`] carries the queue's soft/hard time
//! limits: the worker checks it between pipeline steps, since a running
//! thread cannot be killed safely in-process.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::status::{StatusHandle, TaskStatus};

/// Raised when a task overruns its hard wall-clock budget.
#[derive(Debug, Clone, Error)]
#[error("Task exceeded its hard time limit of {limit_secs}s")]
pub struct TimeLimitExceeded {
    /// The budget that was exceeded, in seconds.
    pub limit_secs: u64,
}

/// Wall-clock budget for one task.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    soft: Duration,
    hard: Duration,
    soft_warned: Arc<Mutex<bool>>,
}

impl Deadline {
    fn new(soft: Duration, hard: Duration) -> Self {
        Self {
            started: Instant::now(),
            soft,
            hard,
            soft_warned: Arc::new(Mutex::new(false)),
        }
    }

    /// Checks the budget; call between pipeline steps.
    ///
    /// Logs one warning after the soft limit; errors past the hard
    /// limit.
    pub fn check(&self, status: &StatusHandle) -> Result<(), TimeLimitExceeded> {
        let elapsed = self.started.elapsed();
        if elapsed >= self.hard {
            return Err(TimeLimitExceeded {
                limit_secs: self.hard.as_secs(),
            });
        }
        if elapsed >= self.soft {
            let mut warned = self.soft_warned.lock().expect("deadline lock poisoned");
            if !*warned {
                *warned = true;
                warn!(elapsed_secs = elapsed.as_secs(), "task passed its soft time limit");
                status.log("soft time limit reached");
            }
        }
        Ok(())
    }
}

/// Handle to a background task; poll with [`TaskHandle::status`] and
/// collect with [`TaskHandle::try_result`] or [`TaskHandle::wait`].
pub struct TaskHandle<T> {
    status: StatusHandle,
    result: Arc<Mutex<Option<Result<T, String>>>>,
    join: Option<JoinHandle<()>>,
}

impl<T> TaskHandle<T> {
    /// Snapshot of the task status.
    pub fn status(&self) -> TaskStatus {
        self.status.snapshot()
    }

    /// Takes the result if the task has finished.
    pub fn try_result(&self) -> Option<Result<T, String>> {
        self.result.lock().expect("result lock poisoned").take()
    }

    /// Blocks until the task finishes and returns its result.
    pub fn wait(mut self) -> Result<T, String> {
        if let Some(join) = self.join.take() {
            // The worker records status and result before exiting, even
            // when the closure panicked.
            let _ = join.join();
        }
        self.result
            .lock()
            .expect("result lock poisoned")
            .take()
            .unwrap_or_else(|| Err("task produced no result".to_string()))
    }
}

/// Spawns background tasks with a shared time-limit policy.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    soft_limit: Duration,
    hard_limit: Duration,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self {
            soft_limit: Duration::from_secs(270),
            hard_limit: Duration::from_secs(300),
        }
    }
}

impl WorkerPool {
    /// Creates a pool with explicit soft/hard limits.
    pub fn new(soft_limit: Duration, hard_limit: Duration) -> Self {
        Self {
            soft_limit,
            hard_limit,
        }
    }

    /// Runs `work` on a new worker thread.
    ///
    /// The closure receives the status handle and the deadline; its
    /// error is captured as the failed status message.
    pub fn spawn<T, F>(&self, total_steps: usize, work: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&StatusHandle, &Deadline) -> Result<T, String> + Send + 'static,
    {
        let status = StatusHandle::new(total_steps);
        let result: Arc<Mutex<Option<Result<T, String>>>> = Arc::new(Mutex::new(None));
        let deadline = Deadline::new(self.soft_limit, self.hard_limit);

        let worker_status = status.clone();
        let worker_result = Arc::clone(&result);
        let join = std::thread::spawn(move || {
            // A panic inside `work` must still settle the status and
            // result, or pollers would spin on Running forever.
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                work(&worker_status, &deadline)
            }))
            .unwrap_or_else(|payload| Err(panic_message(payload)));
            match &outcome {
                Ok(_) => worker_status.complete(),
                Err(message) => worker_status.fail(message.clone()),
            }
            let mut slot = worker_result.lock().expect("result lock poisoned");
            *slot = Some(outcome);
        });

        TaskHandle {
            status,
            result,
            join: Some(join),
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}
