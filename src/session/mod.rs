//! Matchmaking sessions.
//!
//! The protocol itself lives behind [`SessionConnector`] / [`SessionHandle`]:
//! log in with a credential, probe, search, log off. [`manager::SessionManager`]
//! owns the single active [`Session`] built from those handles.

pub mod gateway;
pub mod manager;

use crate::data::{Candidate, Credential, SearchFilter};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One authenticated connection to the matchmaking backend
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Backend-assigned identifier, for logs
    fn id(&self) -> &str;

    /// Cheap "is this account usable right now" check, distinct from a search.
    async fn probe(&self) -> Result<()>;

    async fn search(&self, filter: &SearchFilter, timeout: Duration) -> Result<Vec<Candidate>>;

    /// Drop event subscriptions the login installed. Best effort.
    async fn detach_listeners(&self);

    /// Log off
    async fn close(&self) -> Result<()>;
}

/// Opens sessions from credentials
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn SessionHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Active = 0,
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Active,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// A handle that won acquisition, plus its lifecycle state.
///
/// The search cycle holds an `Arc<Session>` for the duration of one tick;
/// only the manager changes its state.
pub struct Session {
    handle: Arc<dyn SessionHandle>,
    account_id: String,
    acquired_at: DateTime<Utc>,
    state: AtomicU8,
}

impl Session {
    pub(crate) fn new(handle: Arc<dyn SessionHandle>, account_id: String) -> Self {
        Self {
            handle,
            account_id,
            acquired_at: Utc::now(),
            state: AtomicU8::new(SessionState::Active as u8),
        }
    }

    pub fn id(&self) -> &str {
        self.handle.id()
    }

    /// Account the session was opened with
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub async fn search(&self, filter: &SearchFilter, timeout: Duration) -> Result<Vec<Candidate>> {
        self.handle.search(filter, timeout).await
    }

    /// Close the underlying handle. Caller must already have marked it `Closing`.
    pub(crate) async fn close(&self) -> Result<()> {
        let result = self.handle.close().await;
        self.set_state(SessionState::Closed);
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("account_id", &self.account_id)
            .field("state", &self.state())
            .finish()
    }
}
