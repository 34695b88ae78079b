//! linkwatch — connection liveness watching and automatic reconnection.
//!
//! Periodically probes a connection through a [`ConnectionClient`], classifies
//! it as alive or offline from consecutive probe outcomes, and, when enabled,
//! drives bounded reconnect sequences with exponential backoff.
//!
//! # Architecture
//!
//! ```text
//! ConnectionWatcher
//!   ├── TimerGuard ── single background task (Scheduler)
//!   │   ├── client.probe() → ProbeResult
//!   │   ├── ConnectionTracker (counters, Alive/Offline/Reconnecting/GivenUp)
//!   │   └── reconnect::run_sequences → client.reconnect()
//!   └── EventHub → EventStream per subscriber
//! ```
//!
//! # Backoff
//!
//! Offline probes and connection attempts both wait
//! `base * factor ^ min(5, failures)`; see [`backoff::delay`].
//!
//! # Giving up
//!
//! After `maximum_reconnects` failed sequences the watcher emits
//! [`ConnectionEvent::GiveUp`] and deactivates itself. Calling `start()` again
//! resets every counter.

pub mod backoff;
pub mod client;
pub mod error;
pub mod events;
pub mod options;
mod reconnect;
mod scheduler;
pub mod tracker;
pub mod watcher;

pub use client::{ConnectionClient, ProbeResult};
pub use error::{WatcherError, WatcherResult};
pub use events::{ConnectionEvent, EventKind, EventStream};
pub use options::{PartialWatcherOptions, ReconnectLimit, WatcherOptions};
pub use tracker::{Action, ConnectionTracker, Transition, WatchState, WatcherStatus};
pub use watcher::ConnectionWatcher;
