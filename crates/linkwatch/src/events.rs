//! Connection events and their publish/subscribe channel.
//!
//! Every subscriber gets its own [`EventStream`]; dropping the stream is how a
//! listener unsubscribes. Events are fanned out over a tokio broadcast channel.

use std::fmt;

use tokio::sync::broadcast;
use tracing::warn;

use crate::options::ReconnectLimit;

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something observable happened to the watched connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A probe returned success.
    PingSucceeded,
    /// A probe failed; carries the consecutive failure count.
    PingFailed { failed_ping_count: u32 },
    /// The connection became alive again after being offline.
    ConnectionAlive,
    /// The connection went from alive to offline.
    ConnectionLost,
    /// Offline long enough that reconnection is about to start.
    GatewayOffline,
    /// A reconnect sequence is starting.
    Reconnecting {
        attempt: u32,
        maximum: ReconnectLimit,
    },
    /// Reconnect sequences are exhausted; the watcher stopped itself.
    GiveUp,
}

impl ConnectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PingSucceeded => EventKind::PingSucceeded,
            Self::PingFailed { .. } => EventKind::PingFailed,
            Self::ConnectionAlive => EventKind::ConnectionAlive,
            Self::ConnectionLost => EventKind::ConnectionLost,
            Self::GatewayOffline => EventKind::GatewayOffline,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::GiveUp => EventKind::GiveUp,
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PingFailed { failed_ping_count } => {
                write!(f, "{} ({failed_ping_count})", self.kind())
            }
            Self::Reconnecting { attempt, maximum } => {
                write!(f, "{} ({attempt}/{maximum})", self.kind())
            }
            _ => write!(f, "{}", self.kind()),
        }
    }
}

/// Payload-free discriminant of a [`ConnectionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PingSucceeded,
    PingFailed,
    ConnectionAlive,
    ConnectionLost,
    GatewayOffline,
    Reconnecting,
    GiveUp,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PingSucceeded => "ping succeeded",
            Self::PingFailed => "ping failed",
            Self::ConnectionAlive => "connection alive",
            Self::ConnectionLost => "connection lost",
            Self::GatewayOffline => "gateway offline",
            Self::Reconnecting => "reconnecting",
            Self::GiveUp => "give up",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sending half, owned by the watcher.
#[derive(Debug, Clone)]
pub(crate) struct EventHub {
    tx: broadcast::Sender<ConnectionEvent>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn publish(&self, event: ConnectionEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half handed to a listener.
#[derive(Debug)]
pub struct EventStream {
    rx: broadcast::Receiver<ConnectionEvent>,
}

impl EventStream {
    /// Wait for the next event. Returns `None` once the watcher is dropped.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next event of `kind`, discarding others.
    pub async fn recv_kind(&mut self, kind: EventKind) -> Option<ConnectionEvent> {
        while let Some(event) = self.recv().await {
            if event.kind() == kind {
                return Some(event);
            }
        }
        None
    }

    /// Take an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Every event delivered so far, in order.
    pub fn drain(&mut self) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
