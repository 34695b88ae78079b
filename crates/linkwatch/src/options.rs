//! Watcher options and their partial (overlay) form.
//!
//! Callers supply a [`PartialWatcherOptions`] with only the fields they care
//! about; it is overlaid onto [`WatcherOptions::default`] and validated once,
//! at construction. The merged options never change afterwards.

use std::fmt;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{WatcherError, WatcherResult};

/// Upper bound on reconnect sequences before the watcher gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectLimit {
    /// Never give up.
    Unbounded,
    /// Give up once this many sequences have failed.
    #[serde(untagged)]
    Limited(u32),
}

impl ReconnectLimit {
    /// Whether the `attempt`-th reconnect sequence (1-based) may run.
    pub fn allows(&self, attempt: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(max) => attempt <= *max,
        }
    }
}

impl fmt::Display for ReconnectLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// Effective, validated options for a [`ConnectionWatcher`](crate::ConnectionWatcher).
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherOptions {
    /// Delay between consecutive probes while the connection is alive.
    pub ping_interval: Duration,
    /// Consecutive probe failures before the connection is considered offline.
    pub failed_ping_count_until_offline: u32,
    /// Growth rate of the probe delay while offline.
    pub failed_ping_backoff_factor: f64,
    /// Whether a persisting offline state triggers reconnection.
    pub reconnection_enabled: bool,
    /// Consecutive failed probes while offline before a reconnect sequence starts.
    pub offline_ping_count_until_reconnect: u32,
    /// How many reconnect sequences may run before giving up.
    pub maximum_reconnects: ReconnectLimit,
    /// Connection attempts within a single reconnect sequence.
    pub maximum_connection_attempts: u32,
    /// Base delay between connection attempts.
    pub connection_interval: Duration,
    /// Growth rate of the delay between connection attempts.
    pub failed_connection_backoff_factor: f64,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(10),
            failed_ping_count_until_offline: 1,
            failed_ping_backoff_factor: 1.5,
            reconnection_enabled: true,
            offline_ping_count_until_reconnect: 3,
            maximum_reconnects: ReconnectLimit::Unbounded,
            maximum_connection_attempts: 3,
            connection_interval: Duration::from_secs(10),
            failed_connection_backoff_factor: 1.5,
        }
    }
}

impl WatcherOptions {
    /// Overlay `partial` onto the defaults and validate the result.
    pub fn from_partial(partial: PartialWatcherOptions) -> WatcherResult<Self> {
        let options = partial.apply_to(Self::default());
        options.validate()?;
        Ok(options)
    }

    /// Reject values the watcher cannot run with.
    pub fn validate(&self) -> WatcherResult<()> {
        if self.ping_interval.is_zero() {
            return Err(WatcherError::invalid(
                "ping_interval",
                "must be greater than zero",
            ));
        }
        if self.connection_interval.is_zero() {
            return Err(WatcherError::invalid(
                "connection_interval",
                "must be greater than zero",
            ));
        }
        if self.failed_ping_count_until_offline == 0 {
            return Err(WatcherError::invalid(
                "failed_ping_count_until_offline",
                "must be at least 1",
            ));
        }
        if self.offline_ping_count_until_reconnect == 0 {
            return Err(WatcherError::invalid(
                "offline_ping_count_until_reconnect",
                "must be at least 1",
            ));
        }
        if self.maximum_connection_attempts == 0 {
            return Err(WatcherError::invalid(
                "maximum_connection_attempts",
                "must be at least 1",
            ));
        }
        check_factor("failed_ping_backoff_factor", self.failed_ping_backoff_factor)?;
        check_factor(
            "failed_connection_backoff_factor",
            self.failed_connection_backoff_factor,
        )?;
        Ok(())
    }

    /// Every field set, for serializing the effective options.
    pub fn to_partial(&self) -> PartialWatcherOptions {
        PartialWatcherOptions {
            ping_interval: Some(self.ping_interval),
            failed_ping_count_until_offline: Some(self.failed_ping_count_until_offline),
            failed_ping_backoff_factor: Some(self.failed_ping_backoff_factor),
            reconnection_enabled: Some(self.reconnection_enabled),
            offline_ping_count_until_reconnect: Some(self.offline_ping_count_until_reconnect),
            maximum_reconnects: Some(self.maximum_reconnects),
            maximum_connection_attempts: Some(self.maximum_connection_attempts),
            connection_interval: Some(self.connection_interval),
            failed_connection_backoff_factor: Some(self.failed_connection_backoff_factor),
        }
    }
}

fn check_factor(field: &'static str, value: f64) -> WatcherResult<()> {
    if !value.is_finite() || value < 1.0 {
        return Err(WatcherError::invalid(
            field,
            format!("must be a finite number >= 1 (got {value})"),
        ));
    }
    Ok(())
}

/// Options as supplied by the caller; unset fields keep their defaults.
///
/// Deserializes from TOML with durations written as `"500ms"`, `"10s"` or `"2m"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialWatcherOptions {
    #[serde(
        default,
        deserialize_with = "de_opt_duration",
        serialize_with = "ser_opt_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub ping_interval: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_ping_count_until_offline: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_ping_backoff_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnection_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_ping_count_until_reconnect: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_reconnects: Option<ReconnectLimit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_connection_attempts: Option<u32>,
    #[serde(
        default,
        deserialize_with = "de_opt_duration",
        serialize_with = "ser_opt_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_interval: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_connection_backoff_factor: Option<f64>,
}

impl PartialWatcherOptions {
    /// Parse a TOML table of watcher options.
    pub fn from_toml_str(content: &str) -> WatcherResult<Self> {
        toml::from_str(content).map_err(|e| WatcherError::Parse(e.to_string()))
    }

    /// Overlay the set fields onto `base`.
    pub fn apply_to(self, base: WatcherOptions) -> WatcherOptions {
        WatcherOptions {
            ping_interval: self.ping_interval.unwrap_or(base.ping_interval),
            failed_ping_count_until_offline: self
                .failed_ping_count_until_offline
                .unwrap_or(base.failed_ping_count_until_offline),
            failed_ping_backoff_factor: self
                .failed_ping_backoff_factor
                .unwrap_or(base.failed_ping_backoff_factor),
            reconnection_enabled: self
                .reconnection_enabled
                .unwrap_or(base.reconnection_enabled),
            offline_ping_count_until_reconnect: self
                .offline_ping_count_until_reconnect
                .unwrap_or(base.offline_ping_count_until_reconnect),
            maximum_reconnects: self.maximum_reconnects.unwrap_or(base.maximum_reconnects),
            maximum_connection_attempts: self
                .maximum_connection_attempts
                .unwrap_or(base.maximum_connection_attempts),
            connection_interval: self
                .connection_interval
                .unwrap_or(base.connection_interval),
            failed_connection_backoff_factor: self
                .failed_connection_backoff_factor
                .unwrap_or(base.failed_connection_backoff_factor),
        }
    }
}

/// Parse a duration string like "5s", "500ms", "2m", "250us" or "40ns".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(us) = s.strip_suffix("us") {
        us.trim().parse::<u64>().ok().map(Duration::from_micros)
    } else if let Some(ns) = s.strip_suffix("ns") {
        ns.trim().parse::<u64>().ok().map(Duration::from_nanos)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Render a duration in the shortest unit [`parse_duration`] reads back.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos % 1_000_000 != 0 {
        return if nanos % 1_000 == 0 {
            format!("{}us", nanos / 1_000)
        } else {
            format!("{nanos}ns")
        };
    }
    let ms = d.as_millis();
    if ms != 0 && ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

fn de_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|s| {
        parse_duration(&s).ok_or_else(|| de::Error::custom(format!("invalid duration '{s}'")))
    })
    .transpose()
}

fn ser_opt_duration<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(d) => serializer.serialize_str(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_partial_yields_defaults() {
        let options = WatcherOptions::from_partial(PartialWatcherOptions::default()).unwrap();
        assert_eq!(options, WatcherOptions::default());
    }

    #[test]
    fn partial_overrides_only_set_fields() {
        let options = WatcherOptions::from_partial(PartialWatcherOptions {
            ping_interval: Some(Duration::from_secs(1)),
            maximum_reconnects: Some(ReconnectLimit::Limited(2)),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(options.ping_interval, Duration::from_secs(1));
        assert_eq!(options.maximum_reconnects, ReconnectLimit::Limited(2));
        assert_eq!(options.failed_ping_backoff_factor, 1.5);
        assert!(options.reconnection_enabled);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = WatcherOptions::from_partial(PartialWatcherOptions {
            ping_interval: Some(Duration::ZERO),
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("ping_interval"));
    }

    #[test]
    fn zero_threshold_rejected() {
        let err = WatcherOptions::from_partial(PartialWatcherOptions {
            failed_ping_count_until_offline: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            WatcherError::InvalidOption {
                field: "failed_ping_count_until_offline",
                ..
            }
        ));
    }

    #[test]
    fn shrinking_or_nan_factor_rejected() {
        for factor in [0.5, f64::NAN, f64::INFINITY] {
            let result = WatcherOptions::from_partial(PartialWatcherOptions {
                failed_connection_backoff_factor: Some(factor),
                ..Default::default()
            });
            assert!(result.is_err(), "factor {factor} should be rejected");
        }
    }

    #[test]
    fn zero_maximum_reconnects_is_valid() {
        let options = WatcherOptions::from_partial(PartialWatcherOptions {
            maximum_reconnects: Some(ReconnectLimit::Limited(0)),
            ..Default::default()
        })
        .unwrap();
        assert!(!options.maximum_reconnects.allows(1));
    }

    #[test]
    fn reconnect_limit_allows() {
        assert!(ReconnectLimit::Unbounded.allows(u32::MAX));
        assert!(ReconnectLimit::Limited(2).allows(2));
        assert!(!ReconnectLimit::Limited(2).allows(3));
    }

    #[test]
    fn parse_toml_partial() {
        let partial = PartialWatcherOptions::from_toml_str(
            r#"
ping_interval = "500ms"
failed_ping_count_until_offline = 3
reconnection_enabled = false
maximum_reconnects = 4
connection_interval = "2m"
"#,
        )
        .unwrap();

        assert_eq!(partial.ping_interval, Some(Duration::from_millis(500)));
        assert_eq!(partial.failed_ping_count_until_offline, Some(3));
        assert_eq!(partial.reconnection_enabled, Some(false));
        assert_eq!(partial.maximum_reconnects, Some(ReconnectLimit::Limited(4)));
        assert_eq!(partial.connection_interval, Some(Duration::from_secs(120)));
        assert_eq!(partial.failed_ping_backoff_factor, None);
    }

    #[test]
    fn parse_toml_unbounded_reconnects() {
        let partial =
            PartialWatcherOptions::from_toml_str(r#"maximum_reconnects = "unbounded""#).unwrap();
        assert_eq!(partial.maximum_reconnects, Some(ReconnectLimit::Unbounded));
    }

    #[test]
    fn parse_toml_rejects_bad_duration() {
        let err = PartialWatcherOptions::from_toml_str(r#"ping_interval = "soon""#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn parse_toml_rejects_unknown_field() {
        assert!(PartialWatcherOptions::from_toml_str("ping_intervall = \"1s\"").is_err());
    }

    #[test]
    fn effective_options_serialize_to_toml() {
        let toml_str = toml::to_string(&WatcherOptions::default().to_partial()).unwrap();
        assert!(toml_str.contains("ping_interval = \"10s\""));
        assert!(toml_str.contains("maximum_reconnects = \"unbounded\""));

        let reparsed = PartialWatcherOptions::from_toml_str(&toml_str).unwrap();
        assert_eq!(
            WatcherOptions::from_partial(reparsed).unwrap(),
            WatcherOptions::default()
        );
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("250us"), Some(Duration::from_micros(250)));
        assert_eq!(parse_duration("40ns"), Some(Duration::from_nanos(40)));
        assert_eq!(parse_duration("fast"), None);
    }

    #[test]
    fn format_duration_picks_largest_unit() {
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_micros(500)), "500us");
        assert_eq!(format_duration(Duration::from_nanos(1_000_001)), "1000001ns");
    }

    #[test]
    fn sub_millisecond_intervals_survive_toml() {
        let options = WatcherOptions {
            ping_interval: Duration::from_micros(500),
            connection_interval: Duration::from_nanos(750),
            ..WatcherOptions::default()
        };
        let toml_str = toml::to_string(&options.to_partial()).unwrap();
        assert!(toml_str.contains("ping_interval = \"500us\""));

        let reparsed = PartialWatcherOptions::from_toml_str(&toml_str).unwrap();
        assert_eq!(WatcherOptions::from_partial(reparsed).unwrap(), options);
    }
}
