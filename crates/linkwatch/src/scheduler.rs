//! The watcher's single timer.
//!
//! A watcher arms at most one background task at a time. The task receives a
//! [`Scheduler`] through which it performs every wait and every external call;
//! the watcher keeps the matching [`TimerGuard`]. Dropping the guard cancels
//! the pending wait or in-flight call and aborts the task, so every path that
//! releases the guard also disarms the timer.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{WatcherError, WatcherResult};

/// The timer was disarmed while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Task-side handle: waits and runs operations until cancelled.
#[derive(Debug)]
pub(crate) struct Scheduler {
    cancel: watch::Receiver<bool>,
}

impl Scheduler {
    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Sleep for `delay` unless the timer is disarmed first.
    pub(crate) async fn sleep(&mut self, delay: Duration) -> Result<(), Cancelled> {
        self.run(tokio::time::sleep(delay)).await
    }

    /// Drive `operation` to completion unless the timer is disarmed first,
    /// in which case the operation is dropped.
    pub(crate) async fn run<F: Future>(&mut self, operation: F) -> Result<F::Output, Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            output = operation => Ok(output),
            // A dropped sender also means the guard is gone.
            _ = self.cancel.changed() => Err(Cancelled),
        }
    }
}

/// Owner-side handle to the armed task. Disarms on drop.
#[derive(Debug)]
pub(crate) struct TimerGuard {
    handle: JoinHandle<()>,
    cancel_tx: watch::Sender<bool>,
}

impl TimerGuard {
    /// Whether the task has run to completion on its own.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
        self.handle.abort();
    }
}

/// Spawn `task` on the current tokio runtime with a fresh scheduler.
pub(crate) fn arm<T, F>(task: T) -> WatcherResult<TimerGuard>
where
    T: FnOnce(Scheduler) -> F,
    F: Future<Output = ()> + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatcherError::NoRuntime)?;
    let (cancel_tx, cancel) = watch::channel(false);
    let handle = runtime.spawn(task(Scheduler { cancel }));
    Ok(TimerGuard { handle, cancel_tx })
}
