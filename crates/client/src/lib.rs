//! Gridiron Client - live feed for the dashboard
//!
//! This crate holds the real-time update layer: the WebSocket transport with
//! reconnect and heartbeat, the message router and its subscriptions, and a
//! simulated transport backed by a sample league.

pub mod config;
pub mod sample;
pub mod ws;

pub use config::{ConfigError, FeedConfig, FeedMode, SimulationConfig};
pub use sample::SampleLeague;
pub use ws::{ConnectionState, LiveFeed, Subscription};
