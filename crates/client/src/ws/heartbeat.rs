//! Liveness tracking for an open channel.
//!
//! Some transports never report a dead peer. While connected, the transport
//! wakes every `ping_interval`, checks how long the channel has been silent
//! and either sends a keepalive ping or forces a reconnect.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// How often to check liveness and send a ping
    pub ping_interval: Duration,
    /// Silence longer than this forces a reconnect. Must exceed `ping_interval`.
    pub silence_threshold: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            silence_threshold: Duration::from_secs(45),
        }
    }
}

/// What the heartbeat should do on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    Ping,
    ForceReconnect { silent_for: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatState {
    last_message_at: Instant,
}

impl HeartbeatState {
    pub fn new(now: Instant) -> Self {
        Self {
            last_message_at: now,
        }
    }

    /// Record inbound traffic.
    pub fn touch(&mut self, now: Instant) {
        self.last_message_at = now;
    }

    pub fn last_message_at(&self) -> Instant {
        self.last_message_at
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_message_at)
    }

    pub fn check(&self, now: Instant, config: &HeartbeatConfig) -> HeartbeatAction {
        let silent_for = self.silence(now);
        if silent_for > config.silence_threshold {
            HeartbeatAction::ForceReconnect { silent_for }
        } else {
            HeartbeatAction::Ping
        }
    }
}
