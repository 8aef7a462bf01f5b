//! Connection lifecycle types shared by the real and simulated transports.
//!
//! This module holds the connection state, the reconnect policy and the
//! transport seams, and includes both transport implementations.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use gridiron_shared::ClientMessage;

use crate::ws::registry::Subscription;

/// Connection state for the live feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, ConnectionState::Connecting)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff, must be greater than 1
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = f64::from(self.backoff_multiplier).powi(attempt.min(i32::MAX as u32) as i32);
        let delay = f64::from(self.initial_delay_ms) * factor;
        // `as` saturates, so an infinite product still lands on the cap
        (delay as u64).min(u64::from(self.max_delay_ms))
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }
}

/// Snapshot of the reconnect bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectState {
    /// Failed or closed connections since the last successful open
    pub attempts: u32,
    /// Delay chosen for the most recent (or next) attempt
    pub current_delay_ms: u64,
}

/// Decides whether and when to retry after an unplanned disconnect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    state: ReconnectState,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let state = ReconnectState {
            attempts: 0,
            current_delay_ms: u64::from(config.initial_delay_ms),
        };
        Self { config, state }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.config.exhausted(self.state.attempts) {
            return None;
        }
        self.state.current_delay_ms = self.config.delay_for_attempt(self.state.attempts);
        Some(Duration::from_millis(self.state.current_delay_ms))
    }

    /// Count an attempt as started. Called when the reconnect timer fires.
    pub fn record_attempt(&mut self) {
        self.state.attempts = self.state.attempts.saturating_add(1);
    }

    /// Forget past failures after a successful open.
    pub fn reset(&mut self) {
        self.state = ReconnectState {
            attempts: 0,
            current_delay_ms: u64::from(self.config.initial_delay_ms),
        };
    }
}

/// Owner of the feed channel lifecycle.
///
/// [`WsTransport`] talks to a real server; [`SimulatedTransport`] fabricates
/// updates locally. Both publish through the same [`FeedRouter`], so consumers
/// cannot tell which one is active.
///
/// [`FeedRouter`]: crate::ws::FeedRouter
pub trait Transport: Send + Sync {
    /// Start connecting. Cancels any pending reconnect.
    fn connect(&self);

    /// Close the channel and stop all automatic reconnection.
    fn disconnect(&self);

    /// Tear down the current channel and connect again.
    fn reconnect(&self) {
        self.disconnect();
        self.connect();
    }

    /// Queue a message for the server. Returns `false` when not connected.
    fn send_message(&self, message: &ClientMessage) -> bool;

    fn connection_status(&self) -> ConnectionState;

    /// Subscribe to connection transitions. `callback` first receives the
    /// current state, then every later transition, in the order they happened.
    fn subscribe_connection(&self, callback: StatusCallback) -> Subscription;
}

/// Connection-status callback handed to [`Transport::subscribe_connection`].
pub type StatusCallback = Box<dyn Fn(&ConnectionState) + Send + Sync>;

/// Errors raised by the underlying channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("channel closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Outbound half of an open channel, carrying text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
/// Inbound half of an open channel, yielding text frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open, bidirectional text channel.
pub struct Channel {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens channels to a feed endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Channel, TransportError>;
}

// Include transport implementations
mod connection_native;
mod connection_simulated;

pub use connection_native::{
    TungsteniteConnector, WsTransport, CONNECTION_ERROR_MESSAGE, CONNECT_FAILED_MESSAGE,
    MAX_ATTEMPTS_MESSAGE, URL_MISSING_MESSAGE,
};
pub use connection_simulated::SimulatedTransport;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_table() {
        let config = ReconnectConfig::default();
        let delays: Vec<u64> = (0..=10).map(|n| config.delay_for_attempt(n)).collect();
        assert_eq!(
            delays,
            vec![1000, 1500, 2250, 3375, 5062, 7593, 11390, 17085, 25628, 30000, 30000]
        );
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        for multiplier in [1.1f32, 1.5, 2.0, 3.7] {
            let config = ReconnectConfig {
                backoff_multiplier: multiplier,
                ..ReconnectConfig::default()
            };
            let mut previous = 0;
            for attempt in 0..200 {
                let delay = config.delay_for_attempt(attempt);
                assert!(delay >= previous, "{multiplier}: {delay} < {previous}");
                assert!(delay <= u64::from(config.max_delay_ms));
                previous = delay;
            }
            assert_eq!(config.delay_for_attempt(u32::MAX), 30000);
        }
    }

    #[test]
    fn policy_stops_at_max_attempts() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::default()
        });

        let mut delays = Vec::new();
        while let Some(delay) = policy.next_delay() {
            delays.push(delay.as_millis() as u64);
            policy.record_attempt();
        }
        assert_eq!(delays, vec![1000, 1500, 2250]);
        assert_eq!(policy.state().attempts, 3);
        assert!(policy.next_delay().is_none());
    }

    #[test]
    fn reset_restarts_from_base_delay() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
        for _ in 0..4 {
            policy.next_delay();
            policy.record_attempt();
        }
        assert_eq!(policy.state().current_delay_ms, 3375);

        policy.reset();
        assert_eq!(
            policy.state(),
            ReconnectState {
                attempts: 0,
                current_delay_ms: 1000
            }
        );
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn zero_max_attempts_never_gives_up() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig {
            max_attempts: 0,
            ..ReconnectConfig::default()
        });
        for _ in 0..1000 {
            assert!(policy.next_delay().is_some());
            policy.record_attempt();
        }
        assert_eq!(policy.state().current_delay_ms, 30000);
    }

    #[test]
    fn connection_state_labels() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Error.is_connected());
        assert!(ConnectionState::Connecting.is_connecting());
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }
}
