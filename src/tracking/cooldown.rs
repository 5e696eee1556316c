//! Per-player notification cooldown.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Remembers when each player was last reported.
///
/// Entries are never removed; the window only governs reads. The map is
/// bounded by the number of distinct tracked players.
#[derive(Debug)]
pub struct CooldownTracker {
    window: chrono::Duration,
    last_notified: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
            last_notified: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true, and records `now`, iff `id` has not been reported within
    /// the window. Check and record happen under one lock, so two callers
    /// racing on the same id cannot both get `true`.
    pub fn should_notify(&self, id: &str, now: DateTime<Utc>) -> bool {
        let mut map = self
            .last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let eligible = match map.get(id) {
            Some(last) => now.signed_duration_since(*last) >= self.window,
            None => true,
        };

        if eligible {
            map.insert(id.to_string(), now);
        }
        eligible
    }

    pub fn last_notified(&self, id: &str) -> Option<DateTime<Utc>> {
        self.last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.last_notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
