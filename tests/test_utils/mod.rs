//! In-process fakes for lobbywatch tests

#![allow(dead_code)]

use async_trait::async_trait;
use lobbywatch::data::{Candidate, Credential, MatchPool, SearchFilter, Sighting};
use lobbywatch::error::{Error, Result};
use lobbywatch::integrations::{CredentialSource, Notifier, WatchListSource};
use lobbywatch::search::{SearchCycle, SearchSettings};
use lobbywatch::session::manager::SessionManager;
use lobbywatch::session::{SessionConnector, SessionHandle};
use lobbywatch::tracking::{CooldownTracker, WatchListCache};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

// =============================================================================
// Sessions
// =============================================================================

/// What a fake session answers for one pool
#[derive(Debug, Clone)]
pub enum Reply {
    Found(Vec<String>),
    Fail,
    /// Never answers within any sane timeout
    Hang,
}

pub fn found(ids: &[&str]) -> Reply {
    Reply::Found(ids.iter().map(|s| s.to_string()).collect())
}

/// Search answers shared by every session a connector opens
#[derive(Debug, Default)]
pub struct SearchScript {
    replies: Mutex<HashMap<MatchPool, Reply>>,
}

impl SearchScript {
    pub fn set(&self, pool: MatchPool, reply: Reply) {
        self.replies.lock().unwrap().insert(pool, reply);
    }

    pub fn set_both(&self, prime: Reply, non_prime: Reply) {
        self.set(MatchPool::Prime, prime);
        self.set(MatchPool::NonPrime, non_prime);
    }

    fn reply(&self, pool: MatchPool) -> Reply {
        self.replies
            .lock()
            .unwrap()
            .get(&pool)
            .cloned()
            .unwrap_or(Reply::Found(vec![]))
    }
}

pub struct FakeSession {
    pub id: String,
    pub account: String,
    probe_ok: bool,
    probe_delay: Option<Duration>,
    script: Arc<SearchScript>,
    pub closed: AtomicBool,
    pub detached: AtomicBool,
    pub searches: Mutex<Vec<SearchFilter>>,
}

impl FakeSession {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionHandle for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn probe(&self) -> Result<()> {
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        if self.probe_ok {
            Ok(())
        } else {
            Err(Error::SessionProbe(format!("{} cannot launch", self.account)))
        }
    }

    async fn search(&self, filter: &SearchFilter, _timeout: Duration) -> Result<Vec<Candidate>> {
        self.searches.lock().unwrap().push(filter.clone());
        match self.script.reply(filter.pool) {
            Reply::Found(ids) => Ok(ids.into_iter().map(Candidate::new).collect()),
            Reply::Fail => Err(Error::Search {
                pool: filter.pool,
                message: "backend error".to_string(),
            }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(vec![])
            }
        }
    }

    async fn detach_listeners(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens a [`FakeSession`] per credential. Tokens listed in `rejected` fail
/// the probe; tokens in `unreachable` fail to log in at all.
#[derive(Default)]
pub struct FakeConnector {
    pub script: Arc<SearchScript>,
    rejected: HashSet<String>,
    unreachable: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    probe_delay: Option<Duration>,
    opened: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(mut self, tokens: &[&str]) -> Self {
        self.rejected.extend(tokens.iter().map(|s| s.to_string()));
        self
    }

    pub fn unreachable(mut self, tokens: &[&str]) -> Self {
        self.unreachable.extend(tokens.iter().map(|s| s.to_string()));
        self
    }

    /// Every login waits for a permit on `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Every probe takes `delay` before answering
    pub fn slow_probe(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    pub fn opened(&self) -> Vec<Arc<FakeSession>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn session_for(&self, account: &str) -> Option<Arc<FakeSession>> {
        self.opened()
            .into_iter()
            .rev()
            .find(|s| s.account == account)
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn SessionHandle>> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.unreachable.contains(&credential.token) {
            return Err(Error::Gateway("connection refused".to_string()));
        }

        let n = self.opened.lock().unwrap().len();
        let session = Arc::new(FakeSession {
            id: format!("session-{}-{}", credential.id, n),
            account: credential.id.clone(),
            probe_ok: !self.rejected.contains(&credential.token),
            probe_delay: self.probe_delay,
            script: Arc::clone(&self.script),
            closed: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            searches: Mutex::new(Vec::new()),
        });
        self.opened.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Hands out pre-baked batches in order, then empty batches
#[derive(Default)]
pub struct StaticCredentials {
    batches: Mutex<VecDeque<Result<Vec<Credential>>>>,
    pub calls: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(batches: &[&[&str]]) -> Self {
        let source = Self::default();
        for batch in batches {
            source.push(batch);
        }
        source
    }

    /// Queue a batch; each id doubles as its token
    pub fn push(&self, ids: &[&str]) {
        let batch = ids.iter().map(|id| Credential::new(*id, *id)).collect();
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(Error::CredentialFetch("inventory unavailable".to_string())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<Credential>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.batches.lock().unwrap().pop_front() {
            Some(Ok(batch)) => Ok(batch.into_iter().take(limit).collect()),
            Some(Err(e)) => Err(e),
            None => Ok(vec![]),
        }
    }
}

pub struct StaticWatchList(pub Mutex<Option<Vec<String>>>);

impl StaticWatchList {
    pub fn new(ids: &[&str]) -> Self {
        Self(Mutex::new(Some(ids.iter().map(|s| s.to_string()).collect())))
    }

    pub fn failing() -> Self {
        Self(Mutex::new(None))
    }
}

#[async_trait]
impl WatchListSource for StaticWatchList {
    async fn fetch_ids(&self) -> Result<Vec<String>> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::WatchListFetch("503".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    batches: Mutex<Vec<Vec<Sighting>>>,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, Ordering::SeqCst);
        notifier
    }

    /// Each delivery takes `delay`; the batch is recorded once it lands
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<Vec<Sighting>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_ids(&self) -> Vec<Vec<String>> {
        self.batches()
            .into_iter()
            .map(|b| b.into_iter().map(|s| s.id).collect())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, sightings: Vec<Sighting>) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.batches.lock().unwrap().push(sightings);
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::NotifyDispatch("sink returned 500".to_string()))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub struct Harness {
    pub connector: Arc<FakeConnector>,
    pub credentials: Arc<StaticCredentials>,
    pub sessions: Arc<SessionManager>,
    pub watchlist: Arc<WatchListCache>,
    pub cooldown: Arc<CooldownTracker>,
    pub notifier: Arc<RecordingNotifier>,
    pub cycle: Arc<SearchCycle>,
}

impl Harness {
    pub fn new(connector: FakeConnector, credentials: StaticCredentials, tracked: &[&str]) -> Self {
        Self::with(connector, credentials, tracked, RecordingNotifier::new(), settings())
    }

    pub fn with(
        connector: FakeConnector,
        credentials: StaticCredentials,
        tracked: &[&str],
        notifier: RecordingNotifier,
        settings: SearchSettings,
    ) -> Self {
        let connector = Arc::new(connector);
        let credentials = Arc::new(credentials);
        let sessions = Arc::new(SessionManager::new(
            connector.clone(),
            credentials.clone(),
            20,
        ));
        let watchlist = Arc::new(WatchListCache::with_ids(tracked.iter().copied()));
        let cooldown = Arc::new(CooldownTracker::new(Duration::from_secs(300)));
        let notifier = Arc::new(notifier);
        let cycle = Arc::new(SearchCycle::new(
            Arc::clone(&sessions),
            Arc::clone(&watchlist),
            Arc::clone(&cooldown),
            notifier.clone(),
            settings,
        ));
        Self {
            connector,
            credentials,
            sessions,
            watchlist,
            cooldown,
            notifier,
            cycle,
        }
    }

    pub fn script(&self) -> &SearchScript {
        &self.connector.script
    }
}

/// Default search settings; timeout tests run on paused time
pub fn settings() -> SearchSettings {
    SearchSettings {
        timeout: Duration::from_secs(60),
        ..SearchSettings::default()
    }
}
