//! Scheduled Tasks
//!
//! Cancellable delayed callbacks used for round timeouts and the
//! inter-round pause. A task is aborted when its handle is cancelled or
//! dropped, so a handle stored on a match can never outlive it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a delayed task. Aborts the task on drop.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `action` after `delay` on the current runtime.
    pub fn after<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        Self { handle }
    }

    /// Cancel the task. No-op if it already ran.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the task has run (or was aborted).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
