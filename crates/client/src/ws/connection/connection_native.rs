//! Native WebSocket transport using tokio-tungstenite.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{future, SinkExt, StreamExt};
use gridiron_shared::{ClientMessage, OutboundEnvelope};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{
    Channel, ConnectionState, Connector, FrameSink, FrameStream, ReconnectPolicy, ReconnectState,
    StatusCallback, Transport, TransportError,
};
use crate::config::FeedConfig;
use crate::ws::heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatState};
use crate::ws::registry::Subscription;
use crate::ws::router::{FeedRouter, Notice};
use crate::ws::scheduler::{ScheduledTask, TaskSlot};

pub const URL_MISSING_MESSAGE: &str = "WebSocket URL is not defined";
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to establish connection";
pub const CONNECTION_ERROR_MESSAGE: &str = "Connection error";
pub const MAX_ATTEMPTS_MESSAGE: &str =
    "Maximum reconnection attempts reached. Please refresh the page.";

/// Opens real WebSocket channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<Channel, TransportError> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));

        let stream = read.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        tracing::debug!("Ignoring non-UTF-8 binary frame");
                        None
                    }
                },
                // Pong is handled automatically by tungstenite; close ends the stream
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            })
        });

        Ok(Channel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// The feed's transport shim: owns one channel at a time and keeps it alive.
///
/// Unplanned closes and failed opens are retried with exponential backoff.
/// A heartbeat forces a reconnect when an open channel goes silent. Every
/// transition is published to connection-status subscribers, and every
/// inbound frame goes to the [`FeedRouter`].
///
/// All methods must be called from within a Tokio runtime.
pub struct WsTransport {
    inner: Arc<Inner>,
}

struct Inner {
    url: Option<String>,
    client_id: String,
    heartbeat: HeartbeatConfig,
    connector: Arc<dyn Connector>,
    router: Arc<FeedRouter>,
    state: Mutex<State>,
}

struct Session {
    /// Opens the channel, then reads it until it ends
    reader: ScheduledTask,
    /// Outbound queue, present once the channel is open
    outbound: Option<UnboundedSender<String>>,
}

struct State {
    status: ConnectionState,
    /// Bumped whenever the current channel is superseded. Events and timers
    /// carrying an older epoch are ignored.
    epoch: u64,
    policy: ReconnectPolicy,
    liveness: HeartbeatState,
    session: Option<Session>,
    reconnect_timer: TaskSlot,
    heartbeat_timer: TaskSlot,
}

impl State {
    fn set_status(&mut self, status: ConnectionState, notices: &mut Vec<Notice>) {
        if self.status != status {
            self.status = status;
            notices.push(Notice::Status(status));
        }
    }

    /// Release the session from inside its own reader task.
    fn retire_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.detach();
        }
    }
}

impl WsTransport {
    pub fn new(config: &FeedConfig, connector: impl Connector, router: Arc<FeedRouter>) -> Self {
        let state = State {
            status: ConnectionState::Disconnected,
            epoch: 0,
            policy: ReconnectPolicy::new(config.reconnect.clone()),
            liveness: HeartbeatState::new(Instant::now()),
            session: None,
            reconnect_timer: TaskSlot::new(),
            heartbeat_timer: TaskSlot::new(),
        };

        Self {
            inner: Arc::new(Inner {
                url: config.websocket_url.clone(),
                client_id: config.client_id.clone(),
                heartbeat: config.heartbeat.clone(),
                connector: Arc::new(connector),
                router,
                state: Mutex::new(state),
            }),
        }
    }

    /// Current backoff bookkeeping.
    pub fn reconnect_state(&self) -> ReconnectState {
        self.inner.lock().policy.state()
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.inner.lock().reconnect_timer.is_pending()
    }
}

impl Transport for WsTransport {
    fn connect(&self) {
        self.inner.connect();
    }

    fn disconnect(&self) {
        self.inner.disconnect();
    }

    fn send_message(&self, message: &ClientMessage) -> bool {
        self.inner.send_message(message)
    }

    fn connection_status(&self) -> ConnectionState {
        self.inner.lock().status
    }

    fn subscribe_connection(&self, callback: StatusCallback) -> Subscription {
        let subscription = {
            let state = self.inner.lock();
            self.inner
                .router
                .subscribe_connection_from(state.status, callback)
        };
        self.inner.router.flush();
        subscription
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        // Spawned tasks hold the inner state alive; stop them quietly
        let mut state = self.inner.lock();
        state.epoch += 1;
        state.reconnect_timer.cancel();
        state.heartbeat_timer.cancel();
        state.session = None;
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue this transition's notices while `_state` still holds the lock,
    /// so delivery order matches transition order.
    fn queue(&self, _state: &MutexGuard<'_, State>, notices: Vec<Notice>) {
        self.router.queue(notices);
    }

    fn connect(self: &Arc<Self>) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            state.reconnect_timer.cancel();
            state.heartbeat_timer.cancel();
            state.session = None;
            state.epoch += 1;
            state.set_status(ConnectionState::Connecting, &mut notices);

            match &self.url {
                Some(url) => {
                    tracing::info!("Connecting to feed at {}", url);
                    let inner = Arc::clone(self);
                    let epoch = state.epoch;
                    let url = url.clone();
                    state.session = Some(Session {
                        reader: ScheduledTask::spawn(inner.run_session(epoch, url)),
                        outbound: None,
                    });
                }
                None => {
                    tracing::error!("WebSocket URL is not defined");
                    state.set_status(ConnectionState::Error, &mut notices);
                    notices.push(Notice::Error(URL_MISSING_MESSAGE));
                }
            }
            self.queue(&state, notices);
        }
        self.router.flush();
    }

    fn disconnect(&self) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            state.epoch += 1;
            state.heartbeat_timer.cancel();
            if state.reconnect_timer.cancel() {
                tracing::debug!("Cancelled pending reconnect");
            }
            // Dropping the outbound sender lets the writer close the channel
            if state.session.take().is_some() {
                tracing::info!("Closing feed connection");
            }
            state.set_status(ConnectionState::Disconnected, &mut notices);
            self.queue(&state, notices);
        }
        self.router.flush();
    }

    fn send_message(&self, message: &ClientMessage) -> bool {
        let state = self.lock();
        let outbound = state
            .session
            .as_ref()
            .and_then(|session| session.outbound.as_ref());
        let Some(outbound) = outbound.filter(|_| state.status.is_connected()) else {
            tracing::error!("Cannot send {} message, feed is not connected", message.kind());
            return false;
        };

        match OutboundEnvelope::new(message).to_json() {
            Ok(json) => {
                tracing::debug!("Sending: {}", json);
                outbound.unbounded_send(json).is_ok()
            }
            Err(e) => {
                tracing::error!("Error sending message: {}", e);
                false
            }
        }
    }

    async fn run_session(self: Arc<Self>, epoch: u64, url: String) {
        let channel = match self.connector.open(&url).await {
            Ok(channel) => channel,
            Err(e) => {
                self.on_connect_failed(epoch, e);
                return;
            }
        };

        let Some(mut stream) = self.on_open(epoch, channel) else {
            return;
        };

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(text) => self.on_message(epoch, &text),
                Err(e) => {
                    self.on_channel_error(epoch, e);
                    break;
                }
            }
        }

        self.on_close(epoch);
    }

    fn on_open(self: &Arc<Self>, epoch: u64, channel: Channel) -> Option<FrameStream> {
        let Channel { sink, stream } = channel;
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                // Superseded while opening
                return None;
            }

            tracing::info!("Feed connected");
            state.policy.reset();
            state.liveness.touch(Instant::now());
            state.set_status(ConnectionState::Connected, &mut notices);

            let (sender, receiver) = unbounded();
            tokio::spawn(pump_outbound(sink, receiver));
            if let Some(session) = state.session.as_mut() {
                session.outbound = Some(sender);
            }
            self.start_heartbeat(&mut state, epoch);
            self.queue(&state, notices);
        }
        self.router.flush();

        self.send_message(&ClientMessage::auth(
            self.client_id.clone(),
            env!("CARGO_PKG_VERSION"),
        ));
        Some(stream)
    }

    fn on_message(&self, epoch: u64, text: &str) {
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            // Malformed frames still count as traffic
            state.liveness.touch(Instant::now());
        }
        self.router.route_text(text);
    }

    fn on_channel_error(&self, epoch: u64, error: TransportError) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            tracing::error!("Feed connection error: {}", error);
            state.heartbeat_timer.cancel();
            state.set_status(ConnectionState::Error, &mut notices);
            notices.push(Notice::Error(CONNECTION_ERROR_MESSAGE));
            self.queue(&state, notices);
        }
        self.router.flush();
    }

    fn on_close(self: &Arc<Self>, epoch: u64) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            tracing::info!("Feed connection closed");
            state.retire_session();
            state.heartbeat_timer.cancel();
            state.set_status(ConnectionState::Disconnected, &mut notices);
            self.schedule_reconnect(&mut state, &mut notices);
            self.queue(&state, notices);
        }
        self.router.flush();
    }

    fn on_connect_failed(self: &Arc<Self>, epoch: u64, error: TransportError) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                return;
            }
            tracing::error!("Error connecting to feed: {}", error);
            state.retire_session();
            state.set_status(ConnectionState::Error, &mut notices);
            notices.push(Notice::Error(CONNECT_FAILED_MESSAGE));
            self.schedule_reconnect(&mut state, &mut notices);
            self.queue(&state, notices);
        }
        self.router.flush();
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut State, notices: &mut Vec<Notice>) {
        let attempts = state.policy.state().attempts;
        let Some(delay) = state.policy.next_delay() else {
            tracing::error!("Max reconnection attempts reached ({})", attempts);
            notices.push(Notice::Error(MAX_ATTEMPTS_MESSAGE));
            return;
        };

        tracing::info!(
            "Scheduling reconnect attempt {} in {}ms",
            attempts + 1,
            delay.as_millis()
        );
        let inner = Arc::clone(self);
        let epoch = state.epoch;
        state
            .reconnect_timer
            .replace(ScheduledTask::after(delay, move || inner.fire_reconnect(epoch)));
    }

    fn fire_reconnect(self: &Arc<Self>, epoch: u64) {
        {
            let mut state = self.lock();
            if state.epoch != epoch {
                // Lost a race with disconnect() or a manual connect()
                return;
            }
            if let Some(timer) = state.reconnect_timer.take() {
                timer.detach();
            }
            state.policy.record_attempt();
            let policy = &state.policy;
            tracing::info!(
                "Attempting to reconnect ({}/{})",
                policy.state().attempts,
                policy.config().max_attempts
            );
        }
        self.connect();
    }

    fn start_heartbeat(self: &Arc<Self>, state: &mut State, epoch: u64) {
        let inner = Arc::clone(self);
        let period = self.heartbeat.ping_interval;
        state.heartbeat_timer.replace(ScheduledTask::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !inner.heartbeat_tick(epoch) {
                    break;
                }
            }
        }));
    }

    /// One heartbeat check. Returns whether the heartbeat keeps running.
    fn heartbeat_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let action = {
            let mut state = self.lock();
            if state.epoch != epoch || !state.status.is_connected() {
                return false;
            }
            let action = state.liveness.check(Instant::now(), &self.heartbeat);
            if let HeartbeatAction::ForceReconnect { .. } = action {
                if let Some(timer) = state.heartbeat_timer.take() {
                    timer.detach();
                }
            }
            action
        };

        match action {
            HeartbeatAction::Ping => {
                self.send_message(&ClientMessage::ping(Utc::now()));
                true
            }
            HeartbeatAction::ForceReconnect { silent_for } => {
                tracing::warn!(
                    "No messages received for {}s, reconnecting",
                    silent_for.as_secs()
                );
                self.disconnect();
                self.connect();
                false
            }
        }
    }
}

/// Drain the outbound queue into the channel, then close it.
async fn pump_outbound(mut sink: FrameSink, mut receiver: UnboundedReceiver<String>) {
    while let Some(text) = receiver.next().await {
        if let Err(e) = sink.send(text).await {
            tracing::error!("Send failed: {}", e);
            break;
        }
    }
    if let Err(e) = sink.close().await {
        tracing::debug!("Error closing feed channel: {}", e);
    }
}
