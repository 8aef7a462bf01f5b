//! WebSocket live-update layer for the dashboard.
//!
//! This module provides:
//! - Connection management with exponential-backoff reconnect
//! - Heartbeat detection of silently dead channels
//! - Per-category subscriptions fed by a single message router
//! - A simulated transport for running without a feed server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     LiveFeed                        │
//! │     (connect / disconnect / subscribe_* surface)    │
//! └─────────────────────────────────────────────────────┘
//!                         │
//!             ┌───────────┴───────────┐
//!             ▼                       ▼
//!      ┌─────────────┐        ┌──────────────────┐
//!      │ WsTransport │        │SimulatedTransport│
//!      │ (backoff,   │        │  (SampleLeague   │
//!      │  heartbeat) │        │   on timers)     │
//!      └─────────────┘        └──────────────────┘
//!             │                       │
//!             └───────────┬───────────┘
//!                         ▼
//!              ┌─────────────────────┐
//!              │     FeedRouter      │
//!              │  (parse once, fan   │
//!              │   out by category)  │
//!              └─────────────────────┘
//!                         │
//!     ┌──────┬──────┬─────┼──────┬──────┬──────────┐
//!     ▼      ▼      ▼     ▼      ▼      ▼          ▼
//!   games scores statuses stats news  errors  connection
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let feed = LiveFeed::from_config(&FeedConfig::from_env()?)?;
//!
//! let scores = feed.subscribe_score_updates(|update| {
//!     println!("{}: {}-{}", update.game_id, update.home_score, update.away_score);
//! });
//! feed.connect();
//!
//! // Later
//! scores.unsubscribe();
//! feed.disconnect();
//! ```

pub mod connection;
pub mod heartbeat;
mod manager;
pub mod registry;
pub mod router;
pub mod scheduler;

// Re-export connection types
pub use connection::{
    Channel, ConnectionState, Connector, FrameSink, FrameStream, ReconnectConfig, ReconnectPolicy,
    ReconnectState, SimulatedTransport, StatusCallback, Transport, TransportError,
    TungsteniteConnector, WsTransport, CONNECTION_ERROR_MESSAGE, CONNECT_FAILED_MESSAGE,
    MAX_ATTEMPTS_MESSAGE, URL_MISSING_MESSAGE,
};
pub use heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatState};
pub use manager::LiveFeed;
pub use registry::{Registry, Subscription};
pub use router::{FeedRouter, PARSE_ERROR_MESSAGE};
