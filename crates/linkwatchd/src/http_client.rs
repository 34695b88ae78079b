//! HTTP/1.1 connection client.
//!
//! Holds one persistent connection to the target. Probes are `GET` requests
//! over that connection; reconnecting replaces it with a fresh one.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use linkwatch::{ConnectionClient, ProbeResult};

use crate::config::TargetConfig;

const USER_AGENT: &str = concat!("linkwatchd/", env!("CARGO_PKG_VERSION"));

pub struct HttpClient {
    address: String,
    path: String,
    timeout: Duration,
    /// Request half of the current connection, if one is established.
    sender: Mutex<Option<SendRequest<Empty<Bytes>>>>,
}

impl HttpClient {
    pub fn new(address: &str, path: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            path: path.to_string(),
            timeout,
            sender: Mutex::new(None),
        }
    }

    pub fn from_target(target: &TargetConfig) -> anyhow::Result<Self> {
        Ok(Self::new(&target.address, target.path(), target.timeout()?))
    }

    /// Whether a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.sender
            .lock()
            .await
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    async fn connect(&self) -> anyhow::Result<SendRequest<Empty<Bytes>>> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .with_context(|| format!("connecting to {} timed out", self.address))?
            .with_context(|| format!("failed to connect to {}", self.address))?;

        let io = TokioIo::new(stream);
        let (sender, conn) = tokio::time::timeout(self.timeout, hyper::client::conn::http1::handshake(io))
            .await
            .with_context(|| format!("handshake with {} timed out", self.address))?
            .with_context(|| format!("handshake with {} failed", self.address))?;

        // Drive the connection in the background.
        let address = self.address.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, %address, "connection closed with error");
            }
        });

        Ok(sender)
    }
}

impl ConnectionClient for HttpClient {
    async fn probe(&self) -> ProbeResult {
        let mut current = self.sender.lock().await;
        let Some(sender) = current.as_mut() else {
            debug!(address = %self.address, "probe skipped, not connected");
            return ProbeResult::Failed;
        };

        let req = match http::Request::builder()
            .method("GET")
            .uri(self.path.as_str())
            .header("host", self.address.as_str())
            .header("user-agent", USER_AGENT)
            .body(Empty::<Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(error = %e, path = %self.path, "invalid probe request");
                return ProbeResult::Failed;
            }
        };

        let outcome = tokio::time::timeout(self.timeout, async {
            sender.ready().await?;
            let resp = sender.send_request(req).await?;
            let status = resp.status();
            // Drain the body so the connection can be reused.
            resp.into_body().collect().await?;
            Ok::<_, hyper::Error>(status)
        })
        .await;

        match outcome {
            Ok(Ok(status)) if status.is_success() => ProbeResult::Healthy,
            Ok(Ok(status)) => {
                debug!(%status, path = %self.path, "probe non-2xx");
                ProbeResult::Unhealthy
            }
            Ok(Err(e)) => {
                debug!(error = %e, address = %self.address, "probe request failed");
                *current = None;
                ProbeResult::Failed
            }
            Err(_) => {
                debug!(address = %self.address, "probe timed out");
                *current = None;
                ProbeResult::Failed
            }
        }
    }

    async fn reconnect(&self) -> anyhow::Result<()> {
        let sender = self.connect().await?;
        *self.sender.lock().await = Some(sender);
        info!(address = %self.address, "connected");
        Ok(())
    }
}
