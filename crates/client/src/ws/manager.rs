//! The live feed service consumed by the dashboard.

use std::sync::Arc;

use gridiron_shared::{ClientMessage, Game, NewsItem, ScoreUpdate, StatUpdate, StatusUpdate};

use super::connection::{
    ConnectionState, SimulatedTransport, Transport, TungsteniteConnector, WsTransport,
};
use super::registry::Subscription;
use super::router::FeedRouter;
use crate::config::{ConfigError, FeedConfig, FeedMode};

/// One feed per process: a transport plus the router its events flow through.
///
/// Consumers only see subscriptions and connection state, never which
/// transport is behind them.
pub struct LiveFeed {
    router: Arc<FeedRouter>,
    transport: Box<dyn Transport>,
}

impl LiveFeed {
    /// Wire an explicit transport. `router` must be the one the transport publishes to.
    pub fn new(transport: impl Transport + 'static, router: Arc<FeedRouter>) -> Self {
        Self {
            router,
            transport: Box::new(transport),
        }
    }

    /// Validate `config`, then pick the transport named by `config.mode`.
    pub fn from_config(config: &FeedConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let router = Arc::new(FeedRouter::new());
        let feed = match config.mode {
            FeedMode::Live => {
                if config.websocket_url.is_none() {
                    tracing::error!("Live feed selected without a WebSocket URL");
                }
                let transport = WsTransport::new(config, TungsteniteConnector, router.clone());
                Self::new(transport, router)
            }
            FeedMode::Simulated => {
                tracing::info!("Using simulated feed");
                let transport = SimulatedTransport::new(&config.simulation, router.clone());
                Self::new(transport, router)
            }
        };
        Ok(feed)
    }

    pub fn router(&self) -> &Arc<FeedRouter> {
        &self.router
    }

    pub fn connect(&self) {
        self.transport.connect();
    }

    pub fn disconnect(&self) {
        self.transport.disconnect();
    }

    pub fn reconnect(&self) {
        self.transport.reconnect();
    }

    pub fn send_message(&self, message: &ClientMessage) -> bool {
        self.transport.send_message(message)
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.transport.connection_status()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status().is_connected()
    }

    pub fn subscribe_game_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Game]) + Send + Sync + 'static,
    {
        self.router.subscribe_games(callback)
    }

    pub fn subscribe_score_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ScoreUpdate) + Send + Sync + 'static,
    {
        self.router.subscribe_scores(callback)
    }

    pub fn subscribe_status_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        self.router.subscribe_statuses(callback)
    }

    pub fn subscribe_stat_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatUpdate) + Send + Sync + 'static,
    {
        self.router.subscribe_stats(callback)
    }

    pub fn subscribe_news_updates<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NewsItem) + Send + Sync + 'static,
    {
        self.router.subscribe_news(callback)
    }

    pub fn subscribe_errors<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.router.subscribe_errors(callback)
    }

    /// Subscribe to connection transitions. `callback` first receives the
    /// current state, then every later transition in order.
    pub fn subscribe_connection_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.transport.subscribe_connection(Box::new(callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn states(feed: &LiveFeed) -> (Subscription, Arc<Mutex<Vec<ConnectionState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let subscription =
            feed.subscribe_connection_status(move |state| s.lock().unwrap().push(*state));
        (subscription, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn new_subscribers_learn_the_current_state() {
        let feed = LiveFeed::from_config(&FeedConfig::simulated()).unwrap();
        let (_first, before) = states(&feed);
        assert_eq!(*before.lock().unwrap(), vec![ConnectionState::Disconnected]);

        feed.connect();
        let (_second, after) = states(&feed);
        assert_eq!(*after.lock().unwrap(), vec![ConnectionState::Connected]);
        assert_eq!(
            *before.lock().unwrap(),
            vec![
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn live_feed_without_url_reports_error_once() {
        let feed = LiveFeed::from_config(&FeedConfig::default()).unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        let _errors =
            feed.subscribe_errors(move |message| e.lock().unwrap().push(message.to_string()));
        let (_states, seen) = states(&feed);

        feed.connect();
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;

        assert_eq!(feed.connection_status(), ConnectionState::Error);
        assert_eq!(*errors.lock().unwrap(), vec!["WebSocket URL is not defined"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Error
            ]
        );
        assert!(!feed.send_message(&ClientMessage::ping(chrono::Utc::now())));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_panic_still_returns_a_live_subscription() {
        let feed = LiveFeed::from_config(&FeedConfig::simulated()).unwrap();
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        let _subscription = feed.subscribe_connection_status(move |_| {
            let mut calls = c.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                drop(calls);
                panic!("first call fails");
            }
        });

        feed.connect();
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[test]
    fn from_config_rejects_unusable_timings() {
        let mut config = FeedConfig::live("ws://feed.test/live");
        config.heartbeat.ping_interval = std::time::Duration::ZERO;
        assert!(matches!(
            LiveFeed::from_config(&config),
            Err(ConfigError::InvalidPolicy(_))
        ));

        let mut config = FeedConfig::simulated();
        config.simulation.play_interval = std::time::Duration::ZERO;
        assert!(matches!(
            LiveFeed::from_config(&config),
            Err(ConfigError::InvalidPolicy(_))
        ));
    }
}
