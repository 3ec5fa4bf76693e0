//! Task status surface polled by callers of background work.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Queued, not yet started.
    #[default]
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Complete,
    /// Terminated with an error; the last log entry carries the message.
    Failed,
}

/// One entry in the step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLog {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Step name.
    pub step: String,
    /// Overall progress at the time, 0-100.
    pub progress: u8,
    /// Optional detail message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Pollable status of a background task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Lifecycle state.
    pub status: TaskState,
    /// Overall progress, 0-100.
    pub progress: u8,
    /// Name of the step currently executing.
    pub current_step: String,
    /// Total planned steps.
    pub total_steps: usize,
    /// Steps finished so far.
    pub completed_steps: usize,
    /// Ordered step log.
    pub logs: Vec<StepLog>,
}

impl TaskStatus {
    fn push_log(&mut self, step: &str, message: Option<String>) {
        self.logs.push(StepLog {
            timestamp: Utc::now(),
            step: step.to_string(),
            progress: self.progress,
            message,
        });
    }
}

/// Shared handle for reporting progress from a worker and polling it
/// from callers.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<TaskStatus>>,
}

impl StatusHandle {
    /// Creates a pending status with a step plan size.
    pub fn new(total_steps: usize) -> Self {
        let handle = Self::default();
        {
            let mut status = handle.inner.lock().expect("status lock poisoned");
            status.total_steps = total_steps;
        }
        handle
    }

    /// Snapshot of the current status.
    pub fn snapshot(&self) -> TaskStatus {
        self.inner.lock().expect("status lock poisoned").clone()
    }

    /// Marks the task running and enters a named step.
    pub fn begin_step(&self, step: &str, progress: u8) {
        let mut status = self.inner.lock().expect("status lock poisoned");
        if status.status == TaskState::Pending {
            status.status = TaskState::Running;
        }
        if !status.current_step.is_empty() {
            status.completed_steps += 1;
        }
        status.current_step = step.to_string();
        status.progress = progress.min(100);
        status.push_log(step, None);
    }

    /// Appends a message to the log within the current step.
    pub fn log(&self, message: impl Into<String>) {
        let mut status = self.inner.lock().expect("status lock poisoned");
        let step = status.current_step.clone();
        status.push_log(&step, Some(message.into()));
    }

    /// Replaces the last log entry instead of appending.
    ///
    /// Used for high-frequency sub-progress (per-candidate value-match
    /// generation) so the log is not flooded.
    pub fn replace_last(&self, progress: u8, message: impl Into<String>) {
        let mut status = self.inner.lock().expect("status lock poisoned");
        status.progress = progress.min(100);
        let step = status.current_step.clone();
        let entry = StepLog {
            timestamp: Utc::now(),
            step,
            progress: status.progress,
            message: Some(message.into()),
        };
        match status.logs.last_mut() {
            Some(last) => *last = entry,
            None => status.logs.push(entry),
        }
    }

    /// Marks the task complete.
    pub fn complete(&self) {
        let mut status = self.inner.lock().expect("status lock poisoned");
        if !status.current_step.is_empty() {
            status.completed_steps += 1;
        }
        status.status = TaskState::Complete;
        status.progress = 100;
        status.push_log("complete", None);
    }

    /// Marks the task failed with the message as the terminal log entry.
    pub fn fail(&self, message: impl Into<String>) {
        let mut status = self.inner.lock().expect("status lock poisoned");
        status.status = TaskState::Failed;
        let step = status.current_step.clone();
        status.push_log(&step, Some(message.into()));
    }
}
