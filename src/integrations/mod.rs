//! Remote collaborators: account inventory, watch list, sighting sink.
//!
//! The core only sees the traits below. The HTTP implementations share one
//! pooled client.

pub mod accounts;
pub mod notifier;
pub mod watchlist;

use crate::data::{Credential, Sighting};
use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

/// Shared HTTP client for all API requests to enable connection pooling.
///
/// No global timeout: each request sets its own, since matchmaking searches
/// legitimately run far longer than inventory lookups.
pub static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .user_agent(concat!("lobbywatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
});

/// Supplies batches of candidate login credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Fetch up to `limit` credentials, secrets already decrypted
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<Credential>>;
}

/// Supplies the full set of tracked player ids
#[async_trait]
pub trait WatchListSource: Send + Sync {
    async fn fetch_ids(&self) -> Result<Vec<String>>;
}

/// Accepts batches of sightings. Best effort; callers never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, sightings: Vec<Sighting>) -> Result<()>;
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn with_bearer(
    request: reqwest::RequestBuilder,
    token: Option<&str>,
) -> reqwest::RequestBuilder {
    match token {
        Some(t) => request.header("Authorization", format!("Bearer {}", t)),
        None => request,
    }
}
