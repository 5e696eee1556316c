//! Recurring timers.
//!
//! Three independent loops share the core components:
//! - search: one [`SearchCycle`] tick per period
//! - watch list: wholesale refresh of [`WatchListCache`]
//! - session recovery: reacquire when the manager is left with no session
//!
//! Missed ticks are skipped, never queued. Shutdown is only observed while a
//! loop waits for its next tick, so an acquisition or search in flight always
//! runs to completion and its session is still logged off.

use crate::integrations::WatchListSource;
use crate::search::{SearchCycle, TickOutcome};
use crate::session::manager::SessionManager;
use crate::tracking::WatchListCache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy)]
pub struct Intervals {
    pub search: Duration,
    pub watchlist_refresh: Duration,
    pub session_retry: Duration,
}

impl Intervals {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            search: config.schedule.search_tick.period(),
            watchlist_refresh: config.schedule.watchlist_refresh(),
            session_retry: config.schedule.session_retry(),
        }
    }
}

pub struct Scheduler {
    cycle: Arc<SearchCycle>,
    sessions: Arc<SessionManager>,
    watchlist: Arc<WatchListCache>,
    watchlist_source: Arc<dyn WatchListSource>,
    intervals: Intervals,
}

impl Scheduler {
    pub fn new(
        cycle: Arc<SearchCycle>,
        sessions: Arc<SessionManager>,
        watchlist: Arc<WatchListCache>,
        watchlist_source: Arc<dyn WatchListSource>,
        intervals: Intervals,
    ) -> Self {
        Self {
            cycle,
            sessions,
            watchlist,
            watchlist_source,
            intervals,
        }
    }

    /// Start all loops. Each one exits at its next tick boundary once `stop`
    /// flips to `true` (or its sender is dropped).
    pub fn spawn(&self, stop: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(search_loop(
                Arc::clone(&self.cycle),
                self.intervals.search,
                stop.clone(),
            )),
            tokio::spawn(watchlist_loop(
                Arc::clone(&self.watchlist),
                Arc::clone(&self.watchlist_source),
                self.intervals.watchlist_refresh,
                stop.clone(),
            )),
            tokio::spawn(session_loop(
                Arc::clone(&self.sessions),
                self.intervals.session_retry,
                stop,
            )),
        ]
    }

    /// Run until `shutdown` resolves, then stop the loops and log off.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = self.spawn(stop_rx);
        tracing::info!(
            "Scheduler started (search every {:?}, watch list every {:?})",
            self.intervals.search,
            self.intervals.watchlist_refresh
        );

        shutdown.await;
        tracing::info!("Shutting down");

        let _ = stop_tx.send(true);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Scheduler loop ended abnormally: {}", e);
            }
        }
        self.cycle.flush().await;
        self.sessions.shutdown().await;
    }
}

/// Ticks every `period`, first tick one period from now.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Wait for the next tick. `false` means stop was requested instead.
async fn next_tick(ticks: &mut Interval, stop: &mut watch::Receiver<bool>) -> bool {
    if *stop.borrow() {
        return false;
    }
    tokio::select! {
        _ = ticks.tick() => true,
        _ = stop.changed() => false,
    }
}

async fn search_loop(
    cycle: Arc<SearchCycle>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticks = ticker(period);
    while next_tick(&mut ticks, &mut stop).await {
        match cycle.run_tick().await {
            TickOutcome::Completed { notified } if !notified.is_empty() => {
                tracing::info!(
                    "Sighted {} tracked player(s): {}",
                    notified.len(),
                    notified.join(", ")
                );
            }
            TickOutcome::Reacquired { acquired: false } => {
                tracing::warn!("Forced reacquisition found no usable account");
            }
            outcome => tracing::debug!("Search tick: {:?}", outcome),
        }
    }
}

async fn watchlist_loop(
    cache: Arc<WatchListCache>,
    source: Arc<dyn WatchListSource>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticks = ticker(period);
    while next_tick(&mut ticks, &mut stop).await {
        cache.refresh(source.as_ref()).await;
    }
}

async fn session_loop(
    sessions: Arc<SessionManager>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticks = ticker(period);
    while next_tick(&mut ticks, &mut stop).await {
        if sessions.current().is_some() || sessions.is_acquiring() {
            continue;
        }
        tracing::info!("No active session, retrying acquisition");
        // Exhaustion is already logged by the manager
        let _ = sessions.acquire().await;
    }
}
