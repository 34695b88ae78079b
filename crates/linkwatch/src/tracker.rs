//! Connection state tracking.
//!
//! [`ConnectionTracker`] is the pure half of the watcher: it consumes probe and
//! reconnect outcomes, updates its counters, and answers with the events to
//! publish and the next thing to do. It never sleeps or performs I/O.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backoff;
use crate::client::ProbeResult;
use crate::events::ConnectionEvent;
use crate::options::WatcherOptions;

/// Where the watched connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Probes are succeeding, or have not failed often enough yet.
    Alive,
    /// Offline; carries the consecutive failed probes since going offline.
    Offline { offline_pings: u32 },
    /// A reconnect sequence is running; carries its 1-based number
    /// (0 while handing off).
    Reconnecting { attempt: u32 },
    /// Reconnect sequences exhausted. Terminal until the watcher is restarted.
    GivenUp,
}

/// What the watch loop should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Probe again after the delay.
    Probe(Duration),
    /// Run connection attempts for the current reconnect sequence.
    Reconnect,
    /// Arm nothing further.
    Halt,
}

/// Outcome of feeding a result into the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub events: Vec<ConnectionEvent>,
    pub action: Action,
}

/// Point-in-time copy of the watcher's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStatus {
    pub active: bool,
    pub state: WatchState,
    pub connection_alive: bool,
    pub failed_ping_count: u32,
    pub offline_ping_count: u32,
    pub reconnect_attempt: u32,
}

/// Consecutive-failure counters and the alive/offline classification.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    options: WatcherOptions,
    state: WatchState,
    /// Last known liveness; optimistic until the first probe completes.
    connection_alive: bool,
    /// Consecutive probe failures since the last success.
    failed_ping_count: u32,
    /// Consecutive probe failures while already offline.
    offline_ping_count: u32,
    /// Reconnect sequences started since the connection was last alive.
    reconnect_attempt: u32,
}

impl ConnectionTracker {
    pub fn new(options: WatcherOptions) -> Self {
        Self {
            options,
            state: WatchState::Alive,
            connection_alive: true,
            failed_ping_count: 0,
            offline_ping_count: 0,
            reconnect_attempt: 0,
        }
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        self.state = WatchState::Alive;
        self.connection_alive = true;
        self.failed_ping_count = 0;
        self.offline_ping_count = 0;
        self.reconnect_attempt = 0;
    }

    /// Record a probe result.
    pub fn record_probe(&mut self, result: ProbeResult) -> Transition {
        if self.state == WatchState::GivenUp {
            return Transition::halt();
        }
        if result.is_success() {
            self.record_success()
        } else {
            self.record_failure()
        }
    }

    /// A reconnect sequence restored the connection. Same as a successful probe.
    pub fn record_reconnect_success(&mut self) -> Transition {
        if self.state == WatchState::GivenUp {
            return Transition::halt();
        }
        info!(
            reconnect_attempt = self.reconnect_attempt,
            "connection re-established"
        );
        self.record_success()
    }

    /// Start the next reconnect sequence, or give up if none are left.
    pub fn begin_reconnect_sequence(&mut self) -> Transition {
        if self.state == WatchState::GivenUp {
            return Transition::halt();
        }
        self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);
        let maximum = self.options.maximum_reconnects;

        if !maximum.allows(self.reconnect_attempt) {
            error!(
                reconnect_attempt = self.reconnect_attempt,
                maximum_reconnects = %maximum,
                "reconnect attempts exhausted, giving up"
            );
            self.state = WatchState::GivenUp;
            return Transition {
                events: vec![ConnectionEvent::GiveUp],
                action: Action::Halt,
            };
        }

        info!(
            reconnect_attempt = self.reconnect_attempt,
            maximum_reconnects = %maximum,
            "starting reconnect sequence"
        );
        self.state = WatchState::Reconnecting {
            attempt: self.reconnect_attempt,
        };
        Transition {
            events: vec![ConnectionEvent::Reconnecting {
                attempt: self.reconnect_attempt,
                maximum,
            }],
            action: Action::Reconnect,
        }
    }

    /// Whether another reconnect sequence would run rather than give up.
    pub fn can_begin_sequence(&self) -> bool {
        self.state != WatchState::GivenUp
            && self
                .options
                .maximum_reconnects
                .allows(self.reconnect_attempt.saturating_add(1))
    }

    /// Delay before the next probe.
    pub fn probe_delay(&self) -> Duration {
        if self.connection_alive {
            self.options.ping_interval
        } else {
            backoff::delay(
                self.options.ping_interval,
                self.options.failed_ping_backoff_factor,
                self.offline_ping_count,
            )
        }
    }

    /// Delay after the failed connection attempt `attempt_index` (0-based)
    /// within a sequence.
    pub fn connection_attempt_delay(&self, attempt_index: u32) -> Duration {
        backoff::delay(
            self.options.connection_interval,
            self.options.failed_connection_backoff_factor,
            attempt_index,
        )
    }

    fn record_success(&mut self) -> Transition {
        let mut events = Vec::with_capacity(2);
        self.failed_ping_count = 0;

        if !self.connection_alive {
            self.connection_alive = true;
            self.offline_ping_count = 0;
            self.reconnect_attempt = 0;
            info!("connection alive");
            events.push(ConnectionEvent::ConnectionAlive);
        }
        events.push(ConnectionEvent::PingSucceeded);
        self.state = WatchState::Alive;

        Transition {
            events,
            action: Action::Probe(self.probe_delay()),
        }
    }

    fn record_failure(&mut self) -> Transition {
        self.failed_ping_count = self.failed_ping_count.saturating_add(1);
        let mut events = vec![ConnectionEvent::PingFailed {
            failed_ping_count: self.failed_ping_count,
        }];

        if self.connection_alive {
            if self.failed_ping_count >= self.options.failed_ping_count_until_offline {
                warn!(
                    failures = self.failed_ping_count,
                    threshold = self.options.failed_ping_count_until_offline,
                    "connection lost"
                );
                self.connection_alive = false;
                self.offline_ping_count = 0;
                self.state = WatchState::Offline { offline_pings: 0 };
                events.push(ConnectionEvent::ConnectionLost);
            } else {
                debug!(failures = self.failed_ping_count, "ping failed");
            }
            return Transition {
                events,
                action: Action::Probe(self.probe_delay()),
            };
        }

        self.offline_ping_count = self.offline_ping_count.saturating_add(1);
        if self.options.reconnection_enabled
            && self.offline_ping_count >= self.options.offline_ping_count_until_reconnect
        {
            warn!(
                offline_pings = self.offline_ping_count,
                "gateway offline, reconnecting"
            );
            self.state = WatchState::Reconnecting {
                attempt: self.reconnect_attempt,
            };
            events.push(ConnectionEvent::GatewayOffline);
            return Transition {
                events,
                action: Action::Reconnect,
            };
        }

        self.state = WatchState::Offline {
            offline_pings: self.offline_ping_count,
        };
        let delay = self.probe_delay();
        debug!(
            offline_pings = self.offline_ping_count,
            delay_ms = delay.as_millis() as u64,
            "still offline"
        );
        Transition {
            events,
            action: Action::Probe(delay),
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn connection_alive(&self) -> bool {
        self.connection_alive
    }

    pub fn failed_ping_count(&self) -> u32 {
        self.failed_ping_count
    }

    pub fn offline_ping_count(&self) -> u32 {
        self.offline_ping_count
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn options(&self) -> &WatcherOptions {
        &self.options
    }

    pub fn status(&self, active: bool) -> WatcherStatus {
        WatcherStatus {
            active,
            state: self.state,
            connection_alive: self.connection_alive,
            failed_ping_count: self.failed_ping_count,
            offline_ping_count: self.offline_ping_count,
            reconnect_attempt: self.reconnect_attempt,
        }
    }
}

impl Transition {
    fn halt() -> Self {
        Self {
            events: Vec::new(),
            action: Action::Halt,
        }
    }
}
