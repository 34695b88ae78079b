//! The two capabilities the watcher needs from the connection it supervises.

use std::future::Future;

/// Result of a single liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The endpoint answered positively.
    Healthy,
    /// The endpoint answered, but negatively.
    Unhealthy,
    /// The probe could not be executed (transport error or timeout).
    Failed,
}

impl ProbeResult {
    /// `Unhealthy` and `Failed` are treated identically by the watcher.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// A connection that can be probed and re-established.
///
/// The watcher never calls either method concurrently with the other, and
/// drops the returned future if it is stopped while one is in flight.
pub trait ConnectionClient: Send + Sync + 'static {
    /// Issue a single liveness check.
    fn probe(&self) -> impl Future<Output = ProbeResult> + Send;

    /// Make a single attempt to (re)establish the connection.
    fn reconnect(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}
