//! Request spacing for one API client
//!
//! Every request a client sends, across all endpoints, shares one clock. The
//! wait is measured from the end of the previous request, so a slow response
//! never earns the next request an earlier start.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum gap between the end of one request and the start of
/// the next
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    /// `None` until the first request completes; the first request never waits
    last_end: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter; a zero interval disables waiting
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_end: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspends the caller until the interval since the last completed
    /// request has elapsed
    pub async fn throttle(&self) {
        if self.interval.is_zero() {
            return;
        }

        let wait = self.remaining().await;
        if !wait.is_zero() {
            debug!("Rate limiter waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Records that a request has just finished
    pub async fn complete(&self) {
        *self.last_end.lock().await = Some(Instant::now());
    }

    /// Time left before the next request may start
    pub async fn remaining(&self) -> Duration {
        match *self.last_end.lock().await {
            Some(end) => (end + self.interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}
