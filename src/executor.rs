//! Fire-and-forget task submission.
//!
//! Background copies and close-time cleanup are handed to an [`Executor`]. Nothing is ever
//! returned to the submitter: no handle, no result, no cancellation. The caching directory is
//! correct whatever the executor's concurrency (inline, bounded pool, one thread per task).

use std::sync::Mutex;
use std::thread::JoinHandle;

/// A unit of background work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Accepts units of work and runs them at some point, possibly on the calling thread.
pub trait Executor: Send + Sync {
    /// Submit `task`. Must not report failures back to the caller.
    fn execute(&self, task: Task);
}

/// Runs every task synchronously on the submitting thread.
///
/// With this executor a file copied on first open is already valid by the time that same
/// open decides where to read from.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Spawns one named OS thread per task.
#[derive(Debug)]
pub struct ThreadPerTaskExecutor {
    name: String,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPerTaskExecutor {
    /// Create an executor whose threads are named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Wait for every task submitted so far to finish.
    ///
    /// Tasks submitted concurrently with this call may or may not be waited for.
    pub fn join_all(&self) {
        let handles = {
            let mut guard = self
                .handles
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for h in handles {
            if h.join().is_err() {
                tracing::warn!(executor = %self.name, "background task panicked");
            }
        }
    }
}

impl Default for ThreadPerTaskExecutor {
    fn default() -> Self {
        Self::new("index-copier")
    }
}

impl Executor for ThreadPerTaskExecutor {
    fn execute(&self, task: Task) {
        match std::thread::Builder::new().name(self.name.clone()).spawn(task) {
            Ok(handle) => {
                let mut guard = self
                    .handles
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                guard.retain(|h| !h.is_finished());
                guard.push(handle);
            }
            // The task is dropped; whatever it would have cached stays served from remote.
            Err(err) => tracing::error!(executor = %self.name, %err, "failed to spawn task"),
        }
    }
}
