//! Per-route rate-limit bucket state.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Budget state for one route key.
///
/// Authoritative only from the most recent server response; never predicted
/// ahead of it except to block while exhausted.
#[derive(Debug)]
pub(crate) struct BucketState {
    /// Requests left in the current window, per the last response.
    pub(crate) remaining: u32,
    /// When the window resets, per the last response.
    pub(crate) reset_at: Option<Instant>,
}

impl BucketState {
    fn new() -> Self {
        // A fresh bucket has no observed budget and must admit the first
        // request so the server can tell us one.
        Self {
            remaining: 1,
            reset_at: None,
        }
    }

    /// Applies budget metadata from a response. Missing fields leave the
    /// previous observation in place.
    pub(crate) fn apply(&mut self, remaining: Option<u32>, reset_after: Option<Duration>) {
        if let Some(remaining) = remaining {
            self.remaining = remaining;
        }
        if let Some(reset_after) = reset_after {
            self.reset_at = Some(Instant::now() + reset_after);
        }
    }

    /// Marks the bucket exhausted until `retry_after` from now.
    pub(crate) fn exhaust(&mut self, retry_after: Duration) {
        self.remaining = 0;
        self.reset_at = Some(Instant::now() + retry_after);
    }
}

/// One route's bucket: budget state behind a fair async mutex.
///
/// The mutex doubles as the FIFO pending queue — tokio's mutex wakes waiters
/// in acquisition order, so admission to the route is first-come
/// first-served, and holding the guard across the request linearizes bucket
/// updates per route (the last response observed wins).
pub(crate) struct RouteBucket {
    state: Mutex<BucketState>,
}

impl RouteBucket {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BucketState::new()),
        }
    }

    /// Admits one request, suspending while the budget is exhausted and the
    /// reset time has not elapsed.
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, BucketState> {
        let guard = self.state.lock().await;
        if guard.remaining == 0 {
            if let Some(reset_at) = guard.reset_at {
                let now = Instant::now();
                if reset_at > now {
                    debug!(wait = ?(reset_at - now), "Rate limit budget exhausted, waiting for reset");
                    tokio::time::sleep_until(reset_at).await;
                }
            }
        }
        guard
    }
}
