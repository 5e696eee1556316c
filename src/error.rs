//! Error taxonomy for the watch core.
//!
//! Every variant is recoverable: callers log it and try again on the next
//! tick. Nothing here terminates the process.

use crate::data::MatchPool;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Account inventory unreachable or returned something unparseable
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    /// A credential logged in but the account is not usable right now
    #[error("session probe failed: {0}")]
    SessionProbe(String),

    #[error("no usable session among {tried} credential(s)")]
    SessionExhausted { tried: usize },

    #[error("session acquisition already in progress")]
    AcquisitionInProgress,

    #[error("{pool} search failed: {message}")]
    Search { pool: MatchPool, message: String },

    #[error("{pool} search timed out after {timeout:?}")]
    SearchTimeout { pool: MatchPool, timeout: Duration },

    #[error("watch list fetch failed: {0}")]
    WatchListFetch(String),

    #[error("notify dispatch failed: {0}")]
    NotifyDispatch(String),

    /// Transport failure talking to the matchmaking session gateway
    #[error("session gateway error: {0}")]
    Gateway(String),
}

impl Error {
    /// True for failures that count toward forced reacquisition.
    pub fn is_search_failure(&self) -> bool {
        matches!(self, Self::Search { .. } | Self::SearchTimeout { .. })
    }
}
