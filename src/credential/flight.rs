//! Per-refresh-token single flight.
//!
//! Concurrent requests from one browser carry the same refresh token. Without
//! coordination each would refresh on its own and all but one would end up holding
//! a refresh token the backend already rotated. Callers presenting the same refresh
//! token share a single backend call; a successful outcome stays available to late
//! callers for [`REUSE_WINDOW`] after it finished. A running flight is never dropped.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, OnceCell},
    time::Instant,
};
use tracing::debug;

use super::Credential;
use crate::{backend::Envelope, Error};

pub const REUSE_WINDOW: Duration = Duration::from_secs(30);

type Outcome = Arc<OnceCell<Envelope<Credential>>>;

struct Flight {
    outcome: Outcome,
    // Set once the refresh succeeded; a running flight has none.
    completed: Option<Instant>,
}

impl Flight {
    fn is_live(&self) -> bool {
        self.completed
            .map_or(true, |completed| completed.elapsed() < REUSE_WINDOW)
    }
}

#[derive(Default)]
pub struct RefreshFlights {
    flights: Mutex<HashMap<String, Flight>>,
}

impl RefreshFlights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `refresh` unless a flight for `refresh_token` is already running or
    /// recently succeeded, in which case its outcome is returned.
    ///
    /// Transport errors and `ok == false` outcomes are never kept.
    ///
    /// # Errors
    /// Returns the error produced by `refresh`.
    pub async fn run<F, Fut>(&self, refresh_token: &str, refresh: F) -> Result<Envelope<Credential>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Envelope<Credential>, Error>>,
    {
        let outcome = {
            let mut flights = self.flights.lock().await;
            flights.retain(|_, flight| flight.is_live());
            let flight = flights
                .entry(refresh_token.to_string())
                .or_insert_with(|| Flight {
                    outcome: Arc::new(OnceCell::new()),
                    completed: None,
                });
            if flight.outcome.initialized() {
                debug!("reusing recent refresh outcome");
            }
            flight.outcome.clone()
        };

        let result = outcome.get_or_try_init(refresh).await.cloned();

        if matches!(&result, Ok(envelope) if envelope.ok) {
            self.complete(refresh_token, &outcome).await;
        } else {
            self.forget(refresh_token, &outcome).await;
        }

        result
    }

    async fn complete(&self, refresh_token: &str, outcome: &Outcome) {
        let mut flights = self.flights.lock().await;
        if let Some(flight) = flights
            .get_mut(refresh_token)
            .filter(|flight| Arc::ptr_eq(&flight.outcome, outcome))
        {
            flight.completed.get_or_insert_with(Instant::now);
        }
    }

    async fn forget(&self, refresh_token: &str, outcome: &Outcome) {
        let mut flights = self.flights.lock().await;
        if flights
            .get(refresh_token)
            .is_some_and(|flight| Arc::ptr_eq(&flight.outcome, outcome))
        {
            flights.remove(refresh_token);
        }
    }

    pub async fn len(&self) -> usize {
        self.flights.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flights.lock().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn granted() -> Envelope<Credential> {
        Envelope::success(
            StatusCode::OK,
            Credential {
                access_token: "new-access".to_string(),
                refresh_token: "new-refresh".to_string(),
                expires: i64::MAX,
            },
        )
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(granted())
        };

        let (first, second) = tokio::join!(
            flights.run("old-refresh", refresh),
            flights.run("old-refresh", refresh)
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test]
    async fn late_caller_reuses_success() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(granted())
        };

        flights.run("old-refresh", refresh).await.unwrap();
        let again = flights.run("old-refresh", refresh).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(again.ok);
        assert_eq!(flights.len().await, 1);
    }

    #[tokio::test]
    async fn failures_are_not_kept() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Envelope::<Credential>::failure(StatusCode::UNAUTHORIZED))
        };

        let outcome = flights.run("stale", refresh).await.unwrap();
        assert!(!outcome.ok);
        assert!(flights.is_empty().await);

        flights.run("stale", refresh).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_not_kept() {
        let flights = RefreshFlights::new();
        let result = flights
            .run("token", || async { Err(Error::MissingAccessToken) })
            .await;
        assert!(matches!(result, Err(Error::MissingAccessToken)));
        assert!(flights.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_is_not_dropped_while_running() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(REUSE_WINDOW + Duration::from_secs(2)).await;
            Ok(granted())
        };

        let late = async {
            tokio::time::sleep(REUSE_WINDOW + Duration::from_secs(1)).await;
            flights.run("slow", refresh).await
        };
        let (first, second) = tokio::join!(flights.run("slow", refresh), late);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn reuse_window_starts_when_refresh_finishes() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(25)).await;
            Ok(granted())
        };

        flights.run("old-refresh", refresh).await.unwrap();
        tokio::time::advance(REUSE_WINDOW - Duration::from_secs(1)).await;
        flights.run("old-refresh", refresh).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_outcomes_are_pruned() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(granted())
        };

        flights.run("old-refresh", refresh).await.unwrap();
        assert_eq!(flights.len().await, 1);

        tokio::time::advance(REUSE_WINDOW + Duration::from_secs(1)).await;
        flights.run("other", refresh).await.unwrap();
        assert_eq!(flights.len().await, 1);

        flights.run("old-refresh", refresh).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(flights.len().await, 2);
    }

    #[tokio::test]
    async fn distinct_tokens_do_not_share() {
        let flights = RefreshFlights::new();
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let refresh = || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(granted())
        };

        flights.run("one", refresh).await.unwrap();
        flights.run("two", refresh).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
