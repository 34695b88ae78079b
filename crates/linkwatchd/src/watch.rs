//! The `watch` command: supervise one target until shutdown or give-up.

use std::future::Future;

use tracing::{debug, error, info, warn};

use linkwatch::{ConnectionClient, ConnectionEvent, ConnectionWatcher, EventStream};

use crate::config::DaemonConfig;
use crate::http_client::HttpClient;

/// Why the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The shutdown future completed.
    Shutdown,
    /// Reconnect sequences were exhausted.
    GaveUp,
}

/// Watch the configured HTTP target until `shutdown` resolves or the watcher gives up.
pub async fn run(
    config: &DaemonConfig,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<WatchOutcome> {
    let client = HttpClient::from_target(&config.target)?;
    info!(
        address = %config.target.address,
        path = %config.target.path(),
        "watching target"
    );

    // Not fatal: probes fail and reconnection takes over.
    if let Err(e) = client.reconnect().await {
        warn!(error = %e, "initial connection failed");
    }

    let watcher = ConnectionWatcher::with_options(client, config.watcher_options()?)?;
    supervise(&watcher, shutdown).await
}

/// Start `watcher`, log its events, and stop it when done.
pub async fn supervise<C: ConnectionClient>(
    watcher: &ConnectionWatcher<C>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<WatchOutcome> {
    let mut events = watcher.subscribe();
    watcher.start()?;

    let outcome = watch_events(&mut events, shutdown).await;
    watcher.stop();
    Ok(outcome)
}

async fn watch_events(events: &mut EventStream, shutdown: impl Future<Output = ()>) -> WatchOutcome {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                return WatchOutcome::Shutdown;
            }
            event = events.recv() => match event {
                Some(event) => {
                    log_event(&event);
                    if event == ConnectionEvent::GiveUp {
                        return WatchOutcome::GaveUp;
                    }
                }
                None => return WatchOutcome::Shutdown,
            },
        }
    }
}

fn log_event(event: &ConnectionEvent) {
    let kind = event.kind();
    match event {
        ConnectionEvent::PingSucceeded => debug!(event = %kind, "ping succeeded"),
        ConnectionEvent::PingFailed { failed_ping_count } => {
            debug!(event = %kind, failed_ping_count, "ping failed")
        }
        ConnectionEvent::ConnectionAlive => info!(event = %kind, "connection alive"),
        ConnectionEvent::ConnectionLost => warn!(event = %kind, "connection lost"),
        ConnectionEvent::GatewayOffline => warn!(event = %kind, "target offline"),
        ConnectionEvent::Reconnecting { attempt, maximum } => {
            info!(event = %kind, attempt, maximum = %maximum, "reconnecting")
        }
        ConnectionEvent::GiveUp => error!(event = %kind, "giving up on target"),
    }
}
