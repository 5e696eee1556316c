//! Owner of the single active matchmaking session.
//!
//! `acquire()` walks a credential batch in order, probing each login, and
//! swaps the first usable one in as the active session. It is the only place
//! the active session changes. Only one acquisition runs at a time; a second
//! caller gets [`Error::AcquisitionInProgress`] instead of queueing.

use super::{Session, SessionConnector, SessionHandle, SessionState};
use crate::data::Credential;
use crate::error::{Error, Result};
use crate::integrations::CredentialSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub struct SessionManager {
    connector: Arc<dyn SessionConnector>,
    credentials: Arc<dyn CredentialSource>,
    batch_size: usize,
    active: RwLock<Option<Arc<Session>>>,
    acquiring: AtomicBool,
    /// Untried remainder of the last fetched batch
    cached: Mutex<Vec<Credential>>,
}

/// Clears the busy flag when acquisition ends, however it ends.
struct AcquireGuard<'a>(&'a AtomicBool);

impl<'a> AcquireGuard<'a> {
    fn try_new(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        credentials: Arc<dyn CredentialSource>,
        batch_size: usize,
    ) -> Self {
        Self {
            connector,
            credentials,
            batch_size,
            active: RwLock::new(None),
            acquiring: AtomicBool::new(false),
            cached: Mutex::new(Vec::new()),
        }
    }

    /// The active session, if any. Never waits on an acquisition.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring.load(Ordering::Acquire)
    }

    /// Number of untried credentials left over from the last batch
    pub fn cached_credentials(&self) -> usize {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Find a usable credential and make its session the active one.
    ///
    /// Tries the cached remainder of the previous batch first (or a fresh
    /// batch when nothing is cached). If a cached batch is exhausted, one
    /// fresh batch is fetched and tried. On exhaustion the existing active
    /// session, if any, is left in place.
    pub async fn acquire(&self) -> Result<Arc<Session>> {
        let Some(_guard) = AcquireGuard::try_new(&self.acquiring) else {
            tracing::debug!("Session acquisition already in progress, skipping");
            return Err(Error::AcquisitionInProgress);
        };

        let (batch, from_cache) = self.take_batch().await;
        let mut tried = batch.len();
        if let Some(session) = self.try_batch(batch).await {
            return Ok(session);
        }

        if from_cache {
            tracing::info!("Cached credentials exhausted, fetching a fresh batch");
            let fresh = self.fetch_batch().await;
            tried += fresh.len();
            if let Some(session) = self.try_batch(fresh).await {
                return Ok(session);
            }
        }

        tracing::warn!(
            "No usable session among {} credential(s), will retry on the next trigger",
            tried
        );
        Err(Error::SessionExhausted { tried })
    }

    /// Log off the active session, leaving none.
    pub async fn shutdown(&self) {
        let previous = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(session) = previous {
            session.set_state(SessionState::Closing);
            tracing::info!("Logging off session {}", session.id());
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to log off session {}: {}", session.id(), e);
            }
        }
    }

    async fn take_batch(&self) -> (Vec<Credential>, bool) {
        let cached = {
            let mut guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        if cached.is_empty() {
            (self.fetch_batch().await, false)
        } else {
            (cached, true)
        }
    }

    async fn fetch_batch(&self) -> Vec<Credential> {
        match self.credentials.fetch_batch(self.batch_size).await {
            Ok(batch) => {
                tracing::debug!("Fetched {} credential(s)", batch.len());
                batch
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Vec::new()
            }
        }
    }

    async fn try_batch(&self, batch: Vec<Credential>) -> Option<Arc<Session>> {
        let mut remaining = batch.into_iter();
        while let Some(credential) = remaining.next() {
            match self.open(&credential).await {
                Ok(handle) => {
                    *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
                        remaining.collect();
                    return Some(self.install(handle, credential.id).await);
                }
                Err(e) => {
                    tracing::warn!("Account {} unusable: {}", credential.id, e);
                }
            }
        }
        None
    }

    /// Log in and probe. A handle that fails the probe is closed before
    /// returning the error.
    async fn open(&self, credential: &Credential) -> Result<Arc<dyn SessionHandle>> {
        let handle = self.connector.connect(credential).await?;

        if let Err(e) = handle.probe().await {
            if let Err(close_err) = handle.close().await {
                tracing::debug!("Failed to close rejected session {}: {}", handle.id(), close_err);
            }
            return Err(if matches!(e, Error::SessionProbe(_)) {
                e
            } else {
                Error::SessionProbe(e.to_string())
            });
        }

        Ok(handle)
    }

    async fn install(&self, handle: Arc<dyn SessionHandle>, account_id: String) -> Arc<Session> {
        handle.detach_listeners().await;

        let session = Arc::new(Session::new(handle, account_id));
        let previous = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            let previous = active.replace(Arc::clone(&session));
            // Demote under the same lock so no reader sees two active sessions
            if let Some(prev) = &previous {
                prev.set_state(SessionState::Closing);
            }
            previous
        };

        tracing::info!(
            "Session {} active (account {})",
            session.id(),
            session.account_id()
        );

        if let Some(prev) = previous {
            tracing::info!("Retiring previous session {}", prev.id());
            crate::util::spawn_logged("log off previous session", async move {
                prev.close().await
            });
        }

        session
    }
}
