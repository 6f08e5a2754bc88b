//! Background job infrastructure
//!
//! The platform's job system guarantees at-most-one concurrent execution
//! per task identity; [`TaskQueue`] provides that guarantee in-process.
//! A task identity is a string key (rebuilds key on content type plus
//! group id), and a running task is independently detectable, which is
//! what the admin surface uses to report rebuild progress.

mod rebuild;
mod retention;

pub use rebuild::RebuildPipeline;
pub use retention::{RetentionJob, spawn_retention};

use dashmap::DashMap;
use std::future::Future;

/// At-most-one-concurrent task runner keyed by task identity
#[derive(Debug, Default)]
pub struct TaskQueue {
    running: DashMap<String, ()>,
}

/// Removes the task identity from the running set on completion,
/// including unwinds
struct RunningGuard<'a> {
    queue: &'a TaskQueue,
    task_id: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.queue.running.remove(self.task_id);
    }
}

impl TaskQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task with this identity is currently executing
    #[must_use]
    pub fn is_running(&self, task_id: &str) -> bool {
        self.running.contains_key(task_id)
    }

    /// Run a task under its identity, or return None if one is already
    /// executing under the same identity
    pub async fn run<T, F>(&self, task_id: &str, task: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        {
            use dashmap::mapref::entry::Entry;
            match self.running.entry(task_id.to_string()) {
                Entry::Occupied(_) => return None,
                Entry::Vacant(vacant) => {
                    vacant.insert(());
                }
            }
        }

        let _guard = RunningGuard { queue: self, task_id };
        Some(task.await)
    }
}
