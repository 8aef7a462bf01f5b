//! Message router and per-category subscriber registries.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gridiron_shared::{
    decode, Decoded, FeedEvent, Game, InboundEnvelope, NewsItem, ScoreUpdate, StatUpdate,
    StatusUpdate,
};

use super::connection::{ConnectionState, StatusCallback};
use super::registry::{Registry, Subscription};

/// Error text delivered to error subscribers when an inbound frame can't be decoded
pub const PARSE_ERROR_MESSAGE: &str = "Error processing message";

/// Something a transport reports about its own connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notice {
    Status(ConnectionState),
    Error(&'static str),
}

/// A connection subscriber that stays deaf until its replay has been delivered.
struct ReplayGate {
    open: AtomicBool,
    callback: StatusCallback,
}

enum Pending {
    Notice(Notice),
    Replay {
        gate: Arc<ReplayGate>,
        state: ConnectionState,
    },
}

/// Notices in the order they were raised. One thread drains at a time.
#[derive(Default)]
struct Outbox {
    pending: VecDeque<Pending>,
    flushing: bool,
}

/// Parses inbound frames once and fans each event out to its category.
pub struct FeedRouter {
    games: Registry<[Game]>,
    scores: Registry<ScoreUpdate>,
    statuses: Registry<StatusUpdate>,
    stats: Registry<StatUpdate>,
    news: Registry<NewsItem>,
    errors: Registry<str>,
    connection: Registry<ConnectionState>,
    outbox: Mutex<Outbox>,
}

impl Default for FeedRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedRouter {
    pub fn new() -> Self {
        Self {
            games: Registry::new("game"),
            scores: Registry::new("score"),
            statuses: Registry::new("status"),
            stats: Registry::new("stat"),
            news: Registry::new("news"),
            errors: Registry::new("error"),
            connection: Registry::new("connection"),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Decode one text frame and dispatch it.
    ///
    /// Malformed frames are reported to error subscribers. Frames of an unknown
    /// kind are logged and dropped.
    pub fn route_text(&self, text: &str) {
        match decode(text) {
            Ok(Decoded::Envelope(envelope)) => self.dispatch(&envelope),
            Ok(Decoded::Unknown { kind }) => {
                tracing::warn!("Unknown message type: {}", kind);
            }
            Err(e) => {
                tracing::error!("Error processing feed message: {}", e);
                self.publish_error(PARSE_ERROR_MESSAGE);
            }
        }
    }

    /// Deliver a typed envelope to the subscribers of its category.
    pub fn dispatch(&self, envelope: &InboundEnvelope) {
        match &envelope.event {
            FeedEvent::Games(games) => {
                self.games.notify(games.as_slice());
            }
            FeedEvent::Score(update) => {
                self.scores.notify(update);
            }
            FeedEvent::Status(update) => {
                self.statuses.notify(update);
            }
            FeedEvent::Stats(update) => {
                self.stats.notify(update);
            }
            FeedEvent::News(item) => {
                self.news.notify(item);
            }
            FeedEvent::Error(message) => self.publish_error(message),
            FeedEvent::Ping => {}
        }
    }

    pub fn publish_error(&self, message: &str) {
        self.errors.notify(message);
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue transport notices for delivery.
    ///
    /// Call while holding the lock that guards the transition, so queue order
    /// is transition order. Follow with [`flush`](Self::flush) once released.
    pub(crate) fn queue(&self, notices: impl IntoIterator<Item = Notice>) {
        self.outbox()
            .pending
            .extend(notices.into_iter().map(Pending::Notice));
    }

    /// Deliver queued notices in order.
    ///
    /// If another thread is already delivering, it picks up whatever was
    /// queued here and this returns at once. A subscriber that calls back into
    /// the transport therefore never waits on itself.
    pub(crate) fn flush(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.flushing {
                return;
            }
            outbox.flushing = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox();
                match outbox.pending.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.flushing = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, pending: Pending) {
        match pending {
            Pending::Notice(Notice::Status(state)) => {
                self.connection.notify(&state);
            }
            Pending::Notice(Notice::Error(message)) => {
                self.errors.notify(message);
            }
            Pending::Replay { gate, state } => {
                if catch_unwind(AssertUnwindSafe(|| (gate.callback)(&state))).is_err() {
                    tracing::error!("connection subscriber panicked during replay");
                }
                gate.open.store(true, Ordering::Release);
            }
        }
    }

    pub fn subscribe_games<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Game]) + Send + Sync + 'static,
    {
        self.games.subscribe(callback)
    }

    pub fn subscribe_scores<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ScoreUpdate) + Send + Sync + 'static,
    {
        self.scores.subscribe(callback)
    }

    pub fn subscribe_statuses<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        self.statuses.subscribe(callback)
    }

    pub fn subscribe_stats<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatUpdate) + Send + Sync + 'static,
    {
        self.stats.subscribe(callback)
    }

    pub fn subscribe_news<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NewsItem) + Send + Sync + 'static,
    {
        self.news.subscribe(callback)
    }

    pub fn subscribe_errors<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.errors.subscribe(callback)
    }

    /// Subscribe to connection transitions, without a replay.
    pub fn subscribe_connection<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        self.connection.subscribe(callback)
    }

    /// Subscribe to connection transitions, starting with a replay of `current`.
    ///
    /// The replay is queued behind every notice already waiting, and the
    /// callback ignores those earlier notices. Call under the transport's state
    /// lock, then [`flush`](Self::flush).
    pub(crate) fn subscribe_connection_from(
        &self,
        current: ConnectionState,
        callback: StatusCallback,
    ) -> Subscription {
        let gate = Arc::new(ReplayGate {
            open: AtomicBool::new(false),
            callback,
        });
        let live = Arc::clone(&gate);
        let subscription = self.connection.subscribe(move |state| {
            if live.open.load(Ordering::Acquire) {
                (live.callback)(state);
            }
        });
        self.outbox().pending.push_back(Pending::Replay {
            gate,
            state: current,
        });
        subscription
    }
}
