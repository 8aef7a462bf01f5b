//! Feed configuration from environment variables.

use std::time::Duration;

use url::Url;

use crate::ws::{HeartbeatConfig, ReconnectConfig};

/// Which transport backs the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    /// Real WebSocket connection to `websocket_url`.
    #[default]
    Live,
    /// Locally generated sample updates, no network.
    Simulated,
}

/// Timing for the simulated feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
    pub snapshot_delay: Duration,
    pub play_interval: Duration,
    pub stat_interval: Duration,
    pub news_interval: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            snapshot_delay: Duration::from_millis(500),
            play_interval: Duration::from_secs(5),
            stat_interval: Duration::from_secs(15),
            news_interval: Duration::from_secs(25),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub mode: FeedMode,
    /// `ws://` or `wss://` endpoint. A live feed without one reports an error on connect.
    pub websocket_url: Option<String>,
    /// Sent in the auth handshake
    pub client_id: String,
    pub reconnect: ReconnectConfig,
    pub heartbeat: HeartbeatConfig,
    pub simulation: SimulationConfig,
}

pub const DEFAULT_CLIENT_ID: &str = "gridiron-dash-web";

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::Live,
            websocket_url: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    InvalidVar {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid websocket url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid feed policy: {0}")]
    InvalidPolicy(String),
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            name,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn validate_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => Ok(raw.to_string()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

impl FeedConfig {
    /// Live feed against `url`, defaults otherwise.
    pub fn live(url: impl Into<String>) -> Self {
        Self {
            websocket_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Simulated feed, defaults otherwise.
    pub fn simulated() -> Self {
        Self {
            mode: FeedMode::Simulated,
            ..Self::default()
        }
    }

    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `GRIDIRON_FEED_MODE`: "live" | "simulated" (default: "live")
    /// - `GRIDIRON_WEBSOCKET_URL`, falling back to `PUBLIC_WEBSOCKET_URL`
    /// - `GRIDIRON_CLIENT_ID` (default: "gridiron-dash-web")
    /// - `GRIDIRON_RECONNECT_MAX_ATTEMPTS` (default: 10, 0 = unlimited)
    /// - `GRIDIRON_RECONNECT_BASE_MS` (default: 1000)
    /// - `GRIDIRON_RECONNECT_MAX_MS` (default: 30000)
    /// - `GRIDIRON_RECONNECT_MULTIPLIER` (default: 1.5)
    /// - `GRIDIRON_PING_INTERVAL_SECS` (default: 30)
    /// - `GRIDIRON_SILENCE_THRESHOLD_SECS` (default: 45)
    /// - `GRIDIRON_SIM_SEED` (default: random)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`FeedConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Blank values count as unset
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mode = match lookup("GRIDIRON_FEED_MODE") {
            None => FeedMode::Live,
            Some(value) => match value.trim().to_lowercase().as_str() {
                "live" => FeedMode::Live,
                "simulated" | "sim" => FeedMode::Simulated,
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: "GRIDIRON_FEED_MODE",
                        value,
                        reason: "expected \"live\" or \"simulated\"".to_string(),
                    })
                }
            },
        };

        let websocket_url = lookup("GRIDIRON_WEBSOCKET_URL")
            .or_else(|| lookup("PUBLIC_WEBSOCKET_URL"))
            .map(|url| validate_url(url.trim()))
            .transpose()?;

        let client_id =
            lookup("GRIDIRON_CLIENT_ID").unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let defaults = ReconnectConfig::default();
        let reconnect = ReconnectConfig {
            max_attempts: parse_var(
                &lookup,
                "GRIDIRON_RECONNECT_MAX_ATTEMPTS",
                defaults.max_attempts,
            )?,
            initial_delay_ms: parse_var(
                &lookup,
                "GRIDIRON_RECONNECT_BASE_MS",
                defaults.initial_delay_ms,
            )?,
            max_delay_ms: parse_var(&lookup, "GRIDIRON_RECONNECT_MAX_MS", defaults.max_delay_ms)?,
            backoff_multiplier: parse_var(
                &lookup,
                "GRIDIRON_RECONNECT_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
        };

        let heartbeat = HeartbeatConfig {
            ping_interval: Duration::from_secs(parse_var(
                &lookup,
                "GRIDIRON_PING_INTERVAL_SECS",
                30u64,
            )?),
            silence_threshold: Duration::from_secs(parse_var(
                &lookup,
                "GRIDIRON_SILENCE_THRESHOLD_SECS",
                45u64,
            )?),
        };

        let simulation = SimulationConfig {
            seed: lookup("GRIDIRON_SIM_SEED")
                .map(|seed| {
                    seed.trim().parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                        name: "GRIDIRON_SIM_SEED",
                        reason: e.to_string(),
                        value: seed,
                    })
                })
                .transpose()?,
            ..SimulationConfig::default()
        };

        let config = Self {
            mode,
            websocket_url,
            client_id,
            reconnect,
            heartbeat,
            simulation,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the transports rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let reconnect = &self.reconnect;
        if !(reconnect.backoff_multiplier > 1.0) {
            return Err(ConfigError::InvalidPolicy(format!(
                "backoff multiplier must be greater than 1, got {}",
                reconnect.backoff_multiplier
            )));
        }
        if reconnect.initial_delay_ms > reconnect.max_delay_ms {
            return Err(ConfigError::InvalidPolicy(format!(
                "base delay {}ms exceeds the {}ms cap",
                reconnect.initial_delay_ms, reconnect.max_delay_ms
            )));
        }

        let heartbeat = &self.heartbeat;
        if heartbeat.ping_interval.is_zero() {
            return Err(ConfigError::InvalidPolicy(
                "ping interval must be positive".to_string(),
            ));
        }
        if heartbeat.silence_threshold <= heartbeat.ping_interval {
            return Err(ConfigError::InvalidPolicy(format!(
                "silence threshold {}s must exceed the {}s ping interval",
                heartbeat.silence_threshold.as_secs(),
                heartbeat.ping_interval.as_secs()
            )));
        }

        let simulation = &self.simulation;
        for (name, period) in [
            ("play", simulation.play_interval),
            ("stat", simulation.stat_interval),
            ("news", simulation.news_interval),
        ] {
            if period.is_zero() {
                return Err(ConfigError::InvalidPolicy(format!(
                    "simulated {name} interval must be positive"
                )));
            }
        }
        Ok(())
    }
}
