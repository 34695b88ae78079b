//! linkwatchd — keeps watch over a single HTTP endpoint.
//!
//! Wires an [`HttpClient`](http_client::HttpClient) into a
//! [`linkwatch::ConnectionWatcher`] and logs every connection event.

pub mod config;
pub mod http_client;
pub mod watch;

pub use config::{DaemonConfig, Overrides};
pub use http_client::HttpClient;
pub use watch::WatchOutcome;
