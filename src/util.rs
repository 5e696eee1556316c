//! Utility functions and helpers.

use std::future::Future;
use tokio::task::JoinHandle;

/// Spawn a task whose result nobody waits for, logging a warning if it fails.
///
/// This eliminates the repetitive pattern:
/// ```ignore
/// tokio::spawn(async move {
///     if let Err(e) = work.await {
///         tracing::warn!("Failed to do work: {}", e);
///     }
/// });
/// ```
pub fn spawn_logged<F, E>(context: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            tracing::warn!("Failed to {}: {}", context, e);
        }
    })
}
