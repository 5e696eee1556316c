//! In-memory set of tracked player ids.
//!
//! Refreshed wholesale from the remote watch list on its own timer. A failed
//! refresh keeps the previous set: stale-but-present beats empty.

use crate::integrations::WatchListSource;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct WatchListCache {
    inner: RwLock<Snapshot>,
}

#[derive(Debug, Default)]
struct Snapshot {
    ids: Arc<HashSet<String>>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl WatchListCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache pre-populated with `ids` (used for testing)
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cache = Self::new();
        cache.replace(ids.into_iter().map(Into::into).collect());
        cache
    }

    /// Fetch the full list and swap it in. Returns the new size, or `None`
    /// if the fetch failed and the old set was kept.
    pub async fn refresh(&self, source: &dyn WatchListSource) -> Option<usize> {
        match source.fetch_ids().await {
            Ok(ids) => {
                let ids: HashSet<String> = ids.into_iter().collect();
                let len = ids.len();
                self.replace(ids);
                tracing::info!("Watch list refreshed: {} tracked player(s)", len);
                Some(len)
            }
            Err(e) => {
                tracing::warn!("{}; keeping {} cached id(s)", e, self.len());
                None
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().contains(id)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last successful refresh
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshed_at
    }

    /// Current set. Readers keep the `Arc`, so a concurrent refresh never
    /// blocks on them.
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner).ids)
    }

    fn replace(&self, ids: HashSet<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Snapshot {
            ids: Arc::new(ids),
            refreshed_at: Some(Utc::now()),
        };
    }
}
