//! The connection watcher: lifecycle, watch loop, and event publication.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::client::ConnectionClient;
use crate::error::WatcherResult;
use crate::events::{EventHub, EventStream};
use crate::options::{PartialWatcherOptions, WatcherOptions};
use crate::reconnect;
use crate::scheduler::{self, Scheduler, TimerGuard};
use crate::tracker::{Action, ConnectionTracker, Transition, WatcherStatus};

/// Watches a connection and reconnects it when it stays offline.
///
/// `start()` arms a probe every `ping_interval`; outcomes are classified by a
/// [`ConnectionTracker`] and reported as [`ConnectionEvent`](crate::ConnectionEvent)s
/// to every [`EventStream`] obtained from [`subscribe`](Self::subscribe).
///
/// `start()` must be called from within a tokio runtime. `stop()` may be
/// called from anywhere; once it returns no further probe, reconnect attempt
/// or event happens until the next `start()`.
pub struct ConnectionWatcher<C: ConnectionClient> {
    client: Arc<C>,
    shared: Arc<Shared>,
    /// The single armed watch task, if any.
    timer: Mutex<Option<TimerGuard>>,
}

impl<C: ConnectionClient> ConnectionWatcher<C> {
    /// Create a watcher, overlaying `options` onto the defaults.
    pub fn new(client: C, options: PartialWatcherOptions) -> WatcherResult<Self> {
        Self::with_options(client, WatcherOptions::from_partial(options)?)
    }

    /// Create a watcher with fully specified options.
    pub fn with_options(client: C, options: WatcherOptions) -> WatcherResult<Self> {
        options.validate()?;
        Ok(Self {
            client: Arc::new(client),
            shared: Arc::new(Shared::new(options)),
            timer: Mutex::new(None),
        })
    }

    /// Start watching. Does nothing if already active.
    ///
    /// Resets all counters; the first probe runs after `ping_interval`.
    pub fn start(&self) -> WatcherResult<()> {
        let mut timer = lock(&self.timer);
        let mut inner = self.shared.lock();
        if inner.active {
            debug!("connection watcher already active");
            return Ok(());
        }

        let epoch = inner.epoch + 1;
        let client = self.client.clone();
        let shared = self.shared.clone();
        // Spawned while holding the state lock, so the task cannot observe
        // the previous epoch.
        let guard = scheduler::arm(move |scheduler| run_watch_loop(client, shared, epoch, scheduler))?;

        inner.epoch = epoch;
        inner.active = true;
        inner.tracker.reset();
        drop(inner);

        *timer = Some(guard);
        info!(
            ping_interval_ms = self.shared.options.ping_interval.as_millis() as u64,
            "connection watcher started"
        );
        Ok(())
    }

    /// Stop watching and disarm the pending timer. Idempotent.
    pub fn stop(&self) {
        let mut timer = lock(&self.timer);
        let was_active = {
            let mut inner = self.shared.lock();
            let was_active = inner.active;
            inner.active = false;
            inner.epoch += 1;
            was_active
        };
        // Dropping the guard cancels the wait or in-flight call.
        let guard = timer.take();
        drop(guard);

        if was_active {
            info!("connection watcher stopped");
        }
    }

    /// Whether the watcher is running. Turns false on `stop()` and on giving up.
    pub fn is_active(&self) -> bool {
        self.shared.lock().active
    }

    /// The effective, merged options.
    pub fn options(&self) -> &WatcherOptions {
        &self.shared.options
    }

    /// Listen for connection events from now on.
    pub fn subscribe(&self) -> EventStream {
        self.shared.lock().events.subscribe()
    }

    /// Detach every current subscriber.
    ///
    /// Existing streams yield what was already published and then end;
    /// streams from later `subscribe()` calls are unaffected.
    pub fn unsubscribe_all(&self) {
        self.shared.lock().events = EventHub::new();
        debug!("all event subscribers detached");
    }

    /// Snapshot of the current state and counters.
    pub fn status(&self) -> WatcherStatus {
        let inner = self.shared.lock();
        inner.tracker.status(inner.active)
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: ConnectionClient> Drop for ConnectionWatcher<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State shared between the watcher handle and its task.
pub(crate) struct Shared {
    options: WatcherOptions,
    inner: Mutex<Inner>,
}

struct Inner {
    active: bool,
    /// Bumped on every start and stop; a task only acts for its own epoch.
    epoch: u64,
    tracker: ConnectionTracker,
    events: EventHub,
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.active && self.epoch == epoch
    }
}

impl Shared {
    fn new(options: WatcherOptions) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: false,
                epoch: 0,
                tracker: ConnectionTracker::new(options.clone()),
                events: EventHub::new(),
            }),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }

    pub(crate) fn options(&self) -> &WatcherOptions {
        &self.options
    }

    /// Apply a tracker transition on behalf of the task running `epoch`.
    ///
    /// Events are published under the state lock, so nothing is published
    /// once `stop()` has taken it. Returns `None` if the epoch is stale.
    pub(crate) fn transition(
        &self,
        epoch: u64,
        apply: impl FnOnce(&mut ConnectionTracker) -> Transition,
    ) -> Option<Action> {
        let mut inner = self.lock();
        if !inner.is_current(epoch) {
            return None;
        }
        let Transition { events, action } = apply(&mut inner.tracker);
        for event in events {
            inner.events.publish(event);
        }
        if action == Action::Halt {
            inner.active = false;
        }
        Some(action)
    }

    /// Read tracker state on behalf of the task running `epoch`.
    pub(crate) fn read<T>(&self, epoch: u64, f: impl FnOnce(&ConnectionTracker) -> T) -> Option<T> {
        let inner = self.lock();
        inner.is_current(epoch).then(|| f(&inner.tracker))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The watch loop for a single `start()`.
async fn run_watch_loop<C: ConnectionClient>(
    client: Arc<C>,
    shared: Arc<Shared>,
    epoch: u64,
    mut scheduler: Scheduler,
) {
    debug!(epoch, "watch loop starting");
    let mut next = Action::Probe(shared.options.ping_interval);

    loop {
        let action = match next {
            Action::Probe(delay) => {
                if scheduler.sleep(delay).await.is_err() {
                    break;
                }
                let Ok(result) = scheduler.run(client.probe()).await else {
                    break;
                };
                debug!(?result, "probe completed");
                shared.transition(epoch, |t| t.record_probe(result))
            }
            Action::Reconnect => {
                reconnect::run_sequences(client.as_ref(), &shared, epoch, &mut scheduler).await
            }
            Action::Halt => break,
        };
        match action {
            Some(action) => next = action,
            None => break,
        }
    }

    debug!(epoch, "watch loop exited");
}
