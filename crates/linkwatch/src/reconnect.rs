//! Reconnect driver: bounded sequences of connection attempts.

use tracing::debug;

use crate::client::ConnectionClient;
use crate::scheduler::Scheduler;
use crate::tracker::Action;
use crate::watcher::Shared;

/// Run reconnect sequences until one succeeds or the tracker gives up.
///
/// Each sequence makes up to `maximum_connection_attempts` attempts. A failed
/// attempt is followed by the connection backoff delay, unless it was the last
/// attempt of the last sequence the tracker will allow. Returns `None` when
/// the watcher was stopped underneath us.
pub(crate) async fn run_sequences<C: ConnectionClient>(
    client: &C,
    shared: &Shared,
    epoch: u64,
    scheduler: &mut Scheduler,
) -> Option<Action> {
    let max_attempts = shared.options().maximum_connection_attempts;

    loop {
        match shared.transition(epoch, |t| t.begin_reconnect_sequence())? {
            Action::Reconnect => {}
            other => return Some(other),
        }

        for attempt_index in 0..max_attempts {
            match scheduler.run(client.reconnect()).await.ok()? {
                Ok(()) => {
                    return shared.transition(epoch, |t| t.record_reconnect_success());
                }
                Err(e) => {
                    debug!(
                        attempt = attempt_index + 1,
                        max_attempts,
                        error = %e,
                        "connection attempt failed"
                    );
                }
            }

            let last_attempt = attempt_index + 1 == max_attempts;
            if last_attempt && !shared.read(epoch, |t| t.can_begin_sequence())? {
                break;
            }
            let delay = shared.read(epoch, |t| t.connection_attempt_delay(attempt_index))?;
            scheduler.sleep(delay).await.ok()?;
        }
    }
}
