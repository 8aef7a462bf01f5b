//! Cancellable background tasks.
//!
//! Reconnect delays and the heartbeat interval run as Tokio tasks. Each one is
//! owned by a [`TaskSlot`], so cancelling it is a single call and a slot can
//! never hold two live tasks at once.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A spawned task that is aborted when cancelled or dropped.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn `future` on the current Tokio runtime.
    ///
    /// Panics if called outside a runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(future)),
        }
    }

    /// Run `f` once, after `delay`.
    pub fn after<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        })
    }

    /// Abort the task.
    pub fn cancel(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Give up ownership without aborting.
    ///
    /// A task that is retiring its own slot entry uses this so it is not
    /// aborted while it still has work to finish.
    pub fn detach(mut self) {
        self.handle.take();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Holds at most one scheduled task.
#[derive(Debug, Default)]
pub struct TaskSlot {
    task: Option<ScheduledTask>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `task`, aborting whatever was there before.
    pub fn replace(&mut self, task: ScheduledTask) {
        if let Some(previous) = self.task.replace(task) {
            previous.cancel();
        }
    }

    /// Abort the held task. Returns whether one was still pending.
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.cancel();
                pending
            }
            None => false,
        }
    }

    pub fn take(&mut self) -> Option<ScheduledTask> {
        self.task.take()
    }

    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}
