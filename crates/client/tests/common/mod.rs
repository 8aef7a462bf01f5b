//! In-memory feed server for driving `WsTransport` in tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use gridiron_client::ws::{
    Channel, ConnectionState, Connector, FeedRouter, TransportError, WsTransport,
};
use gridiron_client::FeedConfig;
use tokio::time::Instant;

pub const TEST_URL: &str = "ws://feed.test/live";

/// What the next `open` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Open,
    Fail,
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Outcome>>,
    opens: Mutex<Vec<Instant>>,
    servers: Mutex<VecDeque<ServerEnd>>,
}

/// Scripted connector. Once the script runs out every open fails.
#[derive(Clone, Default)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        let connector = Self::default();
        connector.shared.script.lock().unwrap().extend(script);
        connector
    }

    /// Times at which `open` was called.
    pub fn opens(&self) -> Vec<Instant> {
        self.shared.opens.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.shared.opens.lock().unwrap().len()
    }

    /// Gaps between consecutive opens, in milliseconds.
    pub fn open_gaps_ms(&self) -> Vec<u128> {
        self.opens()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }

    /// Server side of the oldest unclaimed open channel.
    pub fn take_server(&self) -> ServerEnd {
        self.shared
            .servers
            .lock()
            .unwrap()
            .pop_front()
            .expect("no open channel")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<Channel, TransportError> {
        assert_eq!(url, TEST_URL);
        self.shared.opens.lock().unwrap().push(Instant::now());

        let outcome = self
            .shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Fail);
        if outcome == Outcome::Fail {
            return Err(TransportError::Other("connection refused".to_string()));
        }

        let (client_tx, mut server_rx) = unbounded::<String>();
        let (server_tx, client_rx) = unbounded::<Result<String, TransportError>>();

        let received = Arc::new(Mutex::new(Vec::new()));
        let log = received.clone();
        tokio::spawn(async move {
            while let Some(text) = server_rx.next().await {
                log.lock().unwrap().push(text);
            }
        });

        self.shared.servers.lock().unwrap().push_back(ServerEnd {
            received,
            to_client: Some(server_tx),
        });

        Ok(Channel {
            sink: Box::pin(client_tx.sink_map_err(|_| TransportError::Closed)),
            stream: Box::pin(client_rx),
        })
    }
}

pub struct ServerEnd {
    received: Arc<Mutex<Vec<String>>>,
    to_client: Option<UnboundedSender<Result<String, TransportError>>>,
}

impl ServerEnd {
    pub fn send(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.unbounded_send(Ok(text.to_string()));
        }
    }

    pub fn fail(&self, reason: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.unbounded_send(Err(TransportError::Other(reason.to_string())));
        }
    }

    /// End the stream, as an unexpected close would.
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Frames the client has sent, parsed as JSON.
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).expect("client sent invalid JSON"))
            .collect()
    }

    pub fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Everything published by the transport, in order.
#[derive(Clone, Default)]
pub struct Recorder {
    pub states: Arc<Mutex<Vec<ConnectionState>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn attach(router: &FeedRouter) -> Self {
        let recorder = Self::default();
        let states = recorder.states.clone();
        router.subscribe_connection(move |state| states.lock().unwrap().push(*state));
        let errors = recorder.errors.clone();
        router.subscribe_errors(move |message| errors.lock().unwrap().push(message.to_string()));
        recorder
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.states.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn error_count(&self, message: &str) -> usize {
        self.errors().iter().filter(|e| e.as_str() == message).count()
    }
}

pub struct Harness {
    pub transport: WsTransport,
    pub router: Arc<FeedRouter>,
    pub connector: MockConnector,
    pub recorder: Recorder,
}

impl Harness {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self::with_config(FeedConfig::live(TEST_URL), script)
    }

    pub fn with_config(config: FeedConfig, script: impl IntoIterator<Item = Outcome>) -> Self {
        let router = Arc::new(FeedRouter::new());
        let recorder = Recorder::attach(&router);
        let connector = MockConnector::new(script);
        let transport = WsTransport::new(&config, connector.clone(), router.clone());
        Self {
            transport,
            router,
            connector,
            recorder,
        }
    }
}

/// Let spawned tasks run to idle. Advances the paused clock by 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
