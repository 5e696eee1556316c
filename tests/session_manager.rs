//! Tests for session acquisition and failover
//!
//! The manager walks credentials in order, keeps exactly one active session,
//! and never runs two acquisitions at once.

mod test_utils;

use lobbywatch::error::Error;
use lobbywatch::session::SessionState;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{FakeConnector, Harness, StaticCredentials};
use tokio::sync::Semaphore;

/// Poll `cond` until it holds, for work handed to spawned tasks
async fn eventually(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

mod acquisition {
    use super::*;

    #[tokio::test]
    async fn test_first_two_fail_probe_third_wins() {
        let h = Harness::new(
            FakeConnector::new().rejecting(&["a", "b"]),
            StaticCredentials::new(&[&["a", "b", "c"]]),
            &[],
        );

        let session = h.sessions.acquire().await.unwrap();

        assert_eq!(session.account_id(), "c");
        assert!(session.is_active());
        assert_eq!(h.connector.opened().len(), 3);
        assert!(h.connector.session_for("a").unwrap().is_closed());
        assert!(h.connector.session_for("b").unwrap().is_closed());

        let winner = h.connector.session_for("c").unwrap();
        assert!(!winner.is_closed());
        assert!(winner.is_detached(), "listeners detached before install");
        assert_eq!(h.sessions.current().unwrap().id(), winner.id);
        assert_eq!(h.credentials.calls(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_login_is_skipped() {
        let h = Harness::new(
            FakeConnector::new().unreachable(&["down"]),
            StaticCredentials::new(&[&["down", "up"]]),
            &[],
        );

        let session = h.sessions.acquire().await.unwrap();
        assert_eq!(session.account_id(), "up");
        assert_eq!(h.connector.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_is_not_fatal() {
        let credentials = StaticCredentials::default();
        credentials.push_error();
        let h = Harness::new(FakeConnector::new(), credentials, &[]);

        let err = h.sessions.acquire().await.unwrap_err();
        assert!(matches!(err, Error::SessionExhausted { tried: 0 }));
        assert!(h.sessions.current().is_none());
        assert!(!h.sessions.is_acquiring());
    }

    #[tokio::test]
    async fn test_exhausted_fresh_batch_is_not_refetched() {
        let h = Harness::new(
            FakeConnector::new().rejecting(&["x", "y"]),
            StaticCredentials::new(&[&["x", "y"], &["z"]]),
            &[],
        );

        let err = h.sessions.acquire().await.unwrap_err();
        assert!(matches!(err, Error::SessionExhausted { tried: 2 }));
        assert_eq!(h.credentials.calls(), 1);
        assert!(h.sessions.current().is_none());
    }
}

mod replacement {
    use super::*;

    #[tokio::test]
    async fn test_at_most_one_active_after_replace() {
        let h = Harness::new(
            FakeConnector::new(),
            StaticCredentials::new(&[&["a", "b", "c"]]),
            &[],
        );

        let first = h.sessions.acquire().await.unwrap();
        let second = h.sessions.acquire().await.unwrap();
        let third = h.sessions.acquire().await.unwrap();

        // Served from the cached remainder, one inventory call in total
        assert_eq!(h.credentials.calls(), 1);
        assert_eq!(
            [first.account_id(), second.account_id(), third.account_id()],
            ["a", "b", "c"]
        );

        let active: Vec<_> = [&first, &second, &third]
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.account_id().to_string())
            .collect();
        assert_eq!(active, vec!["c"]);
        assert_eq!(h.sessions.current().unwrap().account_id(), "c");

        // The retired sessions are logged off in the background
        let connector = Arc::clone(&h.connector);
        eventually(move || {
            connector.session_for("a").unwrap().is_closed()
                && connector.session_for("b").unwrap().is_closed()
        })
        .await;
        eventually(|| first.state() == SessionState::Closed).await;
        assert!(!h.connector.session_for("c").unwrap().is_closed());
    }

    #[tokio::test]
    async fn test_exhausted_cache_fetches_one_fresh_batch() {
        let h = Harness::new(
            FakeConnector::new().rejecting(&["x", "y"]),
            StaticCredentials::new(&[&["a", "x", "y"], &["z"]]),
            &[],
        );

        let first = h.sessions.acquire().await.unwrap();
        assert_eq!(first.account_id(), "a");
        assert_eq!(h.sessions.cached_credentials(), 2);

        let second = h.sessions.acquire().await.unwrap();
        assert_eq!(second.account_id(), "z");
        assert_eq!(h.credentials.calls(), 2);
        assert_ne!(first.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_existing_session() {
        let h = Harness::new(
            FakeConnector::new().rejecting(&["x"]),
            StaticCredentials::new(&[&["a", "x"]]),
            &[],
        );

        let first = h.sessions.acquire().await.unwrap();
        let err = h.sessions.acquire().await.unwrap_err();

        assert!(matches!(err, Error::SessionExhausted { tried: 1 }));
        assert!(first.is_active());
        assert_eq!(h.sessions.current().unwrap().account_id(), "a");
        assert!(!h.connector.session_for("a").unwrap().is_closed());
    }
}

mod reentrancy {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_acquire_is_rejected_not_queued() {
        let gate = Arc::new(Semaphore::new(0));
        let h = Harness::new(
            FakeConnector::new().gated(Arc::clone(&gate)),
            StaticCredentials::new(&[&["a", "b"]]),
            &[],
        );

        let sessions = Arc::clone(&h.sessions);
        let first = tokio::spawn(async move { sessions.acquire().await });

        let sessions = Arc::clone(&h.sessions);
        eventually(move || sessions.is_acquiring()).await;

        let second = h.sessions.acquire().await;
        assert!(matches!(second, Err(Error::AcquisitionInProgress)));

        gate.add_permits(1);
        let session = first.await.unwrap().unwrap();
        assert_eq!(session.account_id(), "a");
        assert!(!h.sessions.is_acquiring());
        assert_eq!(h.credentials.calls(), 1);
        assert_eq!(h.connector.opened().len(), 1);
    }
}
