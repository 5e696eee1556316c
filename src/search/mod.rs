//! The periodic search-aggregate-notify cycle.
//!
//! Each tick walks these steps, stopping at the first that ends the tick:
//!
//! 1. no active session, or an acquisition running: skip
//! 2. too many consecutive failures: reset the count, reacquire, stop
//! 3. search the prime and non-prime pools; any error or timeout counts as a
//!    failure and stops
//! 4. merge and dedup by player id; an empty merge counts as a failure
//! 5. keep tracked players that are out of cooldown
//! 6. hand the survivors to the notifier without waiting on it

pub mod failures;
pub mod merge;

pub use failures::FailureCounter;
pub use merge::merge_unique;

use crate::config::SearchConfig;
use crate::data::{Candidate, MatchPool, SearchFilter, Sighting};
use crate::error::{Error, Result};
use crate::integrations::Notifier;
use crate::session::manager::SessionManager;
use crate::session::Session;
use crate::tracking::{CooldownTracker, WatchListCache};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub timeout: Duration,
    pub failure_threshold: u32,
    pub min_rank: u32,
    pub game_mode: String,
    pub count_empty_as_failure: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            failure_threshold: config.failure_threshold,
            min_rank: config.min_rank,
            game_mode: config.game_mode.clone(),
            count_empty_as_failure: config.count_empty_as_failure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSession,
    AcquisitionInProgress,
    /// The previous tick had not finished yet
    TickInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    /// Failure threshold reached; an acquisition ran instead of a search
    Reacquired { acquired: bool },
    SearchFailed,
    EmptyResult,
    /// Searches succeeded; `notified` lists the ids handed to the notifier
    Completed { notified: Vec<String> },
}

pub struct SearchCycle {
    sessions: Arc<SessionManager>,
    watchlist: Arc<WatchListCache>,
    cooldown: Arc<CooldownTracker>,
    notifier: Arc<dyn Notifier>,
    failures: FailureCounter,
    settings: SearchSettings,
    running: AtomicBool,
    /// Notifier dispatches that may still be in flight, for `flush`
    dispatches: Mutex<Vec<JoinHandle<()>>>,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SearchCycle {
    pub fn new(
        sessions: Arc<SessionManager>,
        watchlist: Arc<WatchListCache>,
        cooldown: Arc<CooldownTracker>,
        notifier: Arc<dyn Notifier>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            sessions,
            watchlist,
            cooldown,
            notifier,
            failures: FailureCounter::new(),
            settings,
            running: AtomicBool::new(false),
            dispatches: Mutex::new(Vec::new()),
        }
    }

    pub fn failures(&self) -> &FailureCounter {
        &self.failures
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Wait for every notifier dispatch still in flight. Ticks never do
    /// this; it exists for shutdown and one-shot runs.
    pub async fn flush(&self) {
        let pending = std::mem::take(
            &mut *self
                .dispatches
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!("Sighting dispatch task failed: {}", e);
            }
        }
    }

    /// Dispatches not yet known to have finished
    pub fn pending_dispatches(&self) -> usize {
        let mut dispatches = self
            .dispatches
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        dispatches.retain(|h| !h.is_finished());
        dispatches.len()
    }

    pub async fn run_tick(&self) -> TickOutcome {
        self.run_tick_at(Utc::now()).await
    }

    /// Run one tick, stamping cooldowns and sightings with `now`.
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Previous search tick still running, skipping");
            return TickOutcome::Skipped(SkipReason::TickInProgress);
        }
        let _running = RunningGuard(&self.running);

        if self.sessions.is_acquiring() {
            tracing::debug!("Session acquisition in progress, skipping tick");
            return TickOutcome::Skipped(SkipReason::AcquisitionInProgress);
        }
        let Some(session) = self.sessions.current() else {
            tracing::debug!("No active session, skipping tick");
            return TickOutcome::Skipped(SkipReason::NoSession);
        };

        let failures = self.failures.get();
        if self.failures.reached(self.settings.failure_threshold) {
            tracing::warn!(
                "{} consecutive search failures on session {}, reacquiring",
                failures,
                session.id()
            );
            self.failures.reset();
            drop(session);
            let acquired = match self.sessions.acquire().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Reacquisition did not complete: {}", e);
                    false
                }
            };
            return TickOutcome::Reacquired { acquired };
        }

        let (prime, non_prime) = match self.search_both(&session).await {
            Ok(results) => results,
            Err(e) => {
                let n = self.failures.increment();
                tracing::warn!("{} ({} consecutive failure(s))", e, n);
                return TickOutcome::SearchFailed;
            }
        };

        let merged = merge_unique(prime, non_prime);
        if merged.is_empty() {
            if self.settings.count_empty_as_failure {
                let n = self.failures.increment();
                tracing::debug!("Both searches came back empty ({} consecutive)", n);
            } else {
                self.failures.reset();
            }
            return TickOutcome::EmptyResult;
        }
        self.failures.reset();

        let total = merged.len();
        let sightings = self.filter_sightings(merged, now);
        let notified: Vec<String> = sightings.iter().map(|s| s.id.clone()).collect();
        tracing::debug!(
            "Search found {} player(s), {} to report",
            total,
            notified.len()
        );

        if !sightings.is_empty() {
            let notifier = Arc::clone(&self.notifier);
            let handle = crate::util::spawn_logged("dispatch sightings", async move {
                notifier.notify(sightings).await
            });
            let mut dispatches = self
                .dispatches
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            dispatches.retain(|h| !h.is_finished());
            dispatches.push(handle);
        }

        TickOutcome::Completed { notified }
    }

    /// Tracked players out of cooldown. Watch list first, so untracked
    /// players never touch the cooldown map.
    fn filter_sightings(&self, candidates: Vec<Candidate>, now: DateTime<Utc>) -> Vec<Sighting> {
        candidates
            .into_iter()
            .filter(|c| self.watchlist.contains(&c.id) && self.cooldown.should_notify(&c.id, now))
            .map(|c| Sighting::from_candidate(c, now))
            .collect()
    }

    async fn search_both(&self, session: &Session) -> Result<(Vec<Candidate>, Vec<Candidate>)> {
        let (prime, non_prime) = tokio::join!(
            self.search_pool(session, MatchPool::Prime),
            self.search_pool(session, MatchPool::NonPrime),
        );
        Ok((prime?, non_prime?))
    }

    async fn search_pool(&self, session: &Session, pool: MatchPool) -> Result<Vec<Candidate>> {
        let filter = SearchFilter::new(pool, self.settings.min_rank, &self.settings.game_mode);
        let timeout = self.settings.timeout;

        let result = tokio::time::timeout(timeout, session.search(&filter, timeout)).await;
        let mut candidates = match result {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) if e.is_search_failure() => return Err(e),
            Ok(Err(e)) => {
                return Err(Error::Search {
                    pool,
                    message: e.to_string(),
                })
            }
            Err(_) => return Err(Error::SearchTimeout { pool, timeout }),
        };

        for candidate in &mut candidates {
            candidate.pool.get_or_insert(pool);
        }
        Ok(candidates)
    }
}
