//! linkwatchd.toml configuration.
//!
//! ```toml
//! [target]
//! address = "127.0.0.1:8080"
//! path = "/healthz"
//! timeout = "2s"
//!
//! [watcher]
//! ping_interval = "10s"
//! failed_ping_count_until_offline = 3
//! maximum_reconnects = 5
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use linkwatch::options::parse_duration;
use linkwatch::{PartialWatcherOptions, WatcherOptions};

const DEFAULT_PATH: &str = "/healthz";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    pub target: TargetConfig,
    #[serde(default)]
    pub watcher: PartialWatcherOptions,
}

/// The HTTP endpoint being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// `host:port` to connect to.
    pub address: String,
    /// Request path for liveness probes.
    pub path: Option<String>,
    /// Timeout for connecting and for each probe, e.g. "2s" or "500ms".
    pub timeout: Option<String>,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub path: Option<String>,
    pub timeout: Option<String>,
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// A config with default watcher options for `address`.
    pub fn for_target(address: &str) -> Self {
        Self {
            target: TargetConfig {
                address: address.to_string(),
                path: None,
                timeout: None,
            },
            watcher: PartialWatcherOptions::default(),
        }
    }

    /// Load from `path` if given, otherwise build from the overrides alone.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let mut config = match (path, overrides.address.as_deref()) {
            (Some(path), _) => Self::from_file(path)?,
            (None, Some(address)) => Self::for_target(address),
            (None, None) => bail!("either --config or --target is required"),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(address) = overrides.address {
            self.target.address = address;
        }
        if overrides.path.is_some() {
            self.target.path = overrides.path;
        }
        if overrides.timeout.is_some() {
            self.target.timeout = overrides.timeout;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.target.address.trim().is_empty() {
            bail!("target.address is required");
        }
        if !self.target.path().starts_with('/') {
            bail!("target.path must start with '/' (got '{}')", self.target.path());
        }
        self.target.timeout()?;
        self.watcher_options()?;
        Ok(())
    }

    /// Watcher options merged onto the defaults.
    pub fn watcher_options(&self) -> anyhow::Result<WatcherOptions> {
        WatcherOptions::from_partial(self.watcher.clone()).context("invalid [watcher] options")
    }

    /// The config with every default filled in, as TOML.
    pub fn to_effective_toml(&self) -> anyhow::Result<String> {
        let effective = Self {
            target: TargetConfig {
                address: self.target.address.clone(),
                path: Some(self.target.path().to_string()),
                timeout: Some(linkwatch::options::format_duration(self.target.timeout()?)),
            },
            watcher: self.watcher_options()?.to_partial(),
        };
        Ok(toml::to_string_pretty(&effective)?)
    }
}

impl TargetConfig {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_PATH)
    }

    pub fn timeout(&self) -> anyhow::Result<Duration> {
        let Some(raw) = self.timeout.as_deref() else {
            return Ok(DEFAULT_TIMEOUT);
        };
        match parse_duration(raw) {
            Some(d) if !d.is_zero() => Ok(d),
            _ => bail!("target.timeout '{raw}' is not a positive duration"),
        }
    }
}
