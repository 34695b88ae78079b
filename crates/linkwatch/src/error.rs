//! Error types for the connection watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type WatcherResult<T> = Result<T, WatcherError>;

/// Errors that can occur when configuring or starting a watcher.
///
/// Probe and reconnect failures are not errors; they drive the state machine.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("invalid value for '{field}': {message}")]
    InvalidOption {
        field: &'static str,
        message: String,
    },

    #[error("failed to parse watcher options: {0}")]
    Parse(String),

    #[error("watcher must be started from within a tokio runtime")]
    NoRuntime,
}

impl WatcherError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            field,
            message: message.into(),
        }
    }
}
