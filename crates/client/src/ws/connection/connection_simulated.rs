//! Simulated transport for development and demos.
//!
//! Stands in for [`WsTransport`](super::WsTransport) without touching the
//! network: a [`SampleLeague`] is advanced on timers and its events are
//! dispatched through the same router, so subscribers see an ordinary feed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gridiron_shared::{ClientMessage, FeedEvent, InboundEnvelope};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{ConnectionState, StatusCallback, Transport};
use crate::config::SimulationConfig;
use crate::sample::SampleLeague;
use crate::ws::registry::Subscription;
use crate::ws::router::{FeedRouter, Notice};
use crate::ws::scheduler::ScheduledTask;

pub struct SimulatedTransport {
    inner: Arc<SimInner>,
}

struct SimInner {
    config: SimulationConfig,
    router: Arc<FeedRouter>,
    league: Mutex<SampleLeague>,
    state: Mutex<SimState>,
}

struct SimState {
    status: ConnectionState,
    /// Snapshot timer and the three update loops; dropping them stops the feed
    tasks: Vec<ScheduledTask>,
}

impl SimulatedTransport {
    pub fn new(config: &SimulationConfig, router: Arc<FeedRouter>) -> Self {
        Self::with_league(config, SampleLeague::new(config.seed), router)
    }

    /// Simulate a custom slate.
    pub fn with_league(
        config: &SimulationConfig,
        league: SampleLeague,
        router: Arc<FeedRouter>,
    ) -> Self {
        Self {
            inner: Arc::new(SimInner {
                config: config.clone(),
                router,
                league: Mutex::new(league),
                state: Mutex::new(SimState {
                    status: ConnectionState::Disconnected,
                    tasks: Vec::new(),
                }),
            }),
        }
    }
}

impl SimInner {
    fn lock_state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_league(&self) -> MutexGuard<'_, SampleLeague> {
        self.league.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: Vec<FeedEvent>) {
        for event in events {
            self.router.dispatch(&InboundEnvelope::now(event));
        }
    }

    fn every<F>(self: &Arc<Self>, period: Duration, tick: F) -> ScheduledTask
    where
        F: Fn(&mut SampleLeague) -> Vec<FeedEvent> + Send + 'static,
    {
        let inner = Arc::clone(self);
        ScheduledTask::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Release the league before subscribers run
                let events = {
                    let mut league = inner.lock_league();
                    tick(&mut *league)
                };
                inner.emit(events);
            }
        })
    }

    fn start(self: &Arc<Self>) -> Vec<ScheduledTask> {
        let config = &self.config;
        let inner = Arc::clone(self);
        let snapshot = ScheduledTask::after(config.snapshot_delay, move || {
            let games = inner.lock_league().snapshot();
            tracing::debug!("Simulated snapshot with {} games", games.len());
            inner.emit(vec![FeedEvent::Games(games)]);
        });

        vec![
            snapshot,
            self.every(config.play_interval, SampleLeague::play_tick),
            self.every(config.stat_interval, |league| {
                league.stat_tick().into_iter().collect()
            }),
            self.every(config.news_interval, |league| {
                league.news_tick().into_iter().collect()
            }),
        ]
    }
}

impl Transport for SimulatedTransport {
    fn connect(&self) {
        {
            let mut state = self.inner.lock_state();
            state.tasks.clear();
            let mut notices = Vec::new();
            for status in [ConnectionState::Connecting, ConnectionState::Connected] {
                if state.status != status {
                    state.status = status;
                    notices.push(Notice::Status(status));
                }
            }
            state.tasks = self.inner.start();
            self.inner.router.queue(notices);
        }
        tracing::info!("Simulated feed enabled");
        self.inner.router.flush();
    }

    fn disconnect(&self) {
        {
            let mut state = self.inner.lock_state();
            state.tasks.clear();
            if state.status != ConnectionState::Disconnected {
                state.status = ConnectionState::Disconnected;
                tracing::info!("Simulated feed stopped");
                self.inner
                    .router
                    .queue([Notice::Status(ConnectionState::Disconnected)]);
            }
        }
        self.inner.router.flush();
    }

    fn send_message(&self, message: &ClientMessage) -> bool {
        if !self.connection_status().is_connected() {
            tracing::error!("Cannot send {} message, feed is not connected", message.kind());
            return false;
        }
        tracing::debug!("Simulated feed discarding outbound {} message", message.kind());
        true
    }

    fn connection_status(&self) -> ConnectionState {
        self.inner.lock_state().status
    }

    fn subscribe_connection(&self, callback: StatusCallback) -> Subscription {
        let subscription = {
            let state = self.inner.lock_state();
            self.inner
                .router
                .subscribe_connection_from(state.status, callback)
        };
        self.inner.router.flush();
        subscription
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        self.inner.lock_state().tasks.clear();
    }
}
