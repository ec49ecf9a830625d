//! Resilience primitives for catalog-A calls.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

/// Request pacer using a token-bucket approach.
///
/// Limits throughput to a configurable number of requests per second by
/// combining a single-permit [`Semaphore`] with a fixed sleep interval.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    interval: Duration,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` that allows at most
    /// `requests_per_second` requests per second. Zero disables pacing.
    pub fn new(requests_per_second: u32) -> Self {
        let interval = if requests_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(1000 / u64::from(requests_per_second))
        };
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
            interval,
        }
    }

    /// Waits until a request slot is available, then holds the slot for
    /// the configured interval to enforce the rate limit.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        // The semaphore is never closed; a closed semaphore would only mean
        // pacing is skipped.
        if let Ok(_permit) = self.semaphore.acquire().await {
            sleep(self.interval).await;
        }
    }
}

/// Cooldown window for a rate-limited source.
///
/// Each consecutive failure doubles the window (starting at `base`, capped
/// at `max`) and never ends earlier than a server-provided retry-after.
/// A new failure only ever extends an active window.
#[derive(Debug, Clone)]
pub struct Cooldown {
    until: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    base: ChronoDuration,
    max: ChronoDuration,
}

impl Cooldown {
    #[must_use]
    pub fn new(base: ChronoDuration, max: ChronoDuration) -> Self {
        Self {
            until: None,
            consecutive_failures: 0,
            base,
            max: max.max(base),
        }
    }

    /// `true` while calls to the source must be skipped.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Time left in the current window, if any.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<ChronoDuration> {
        self.until.filter(|until| now < *until).map(|until| until - now)
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Start or extend the window after a rate limit or timeout.
    pub fn record_failure(&mut self, now: DateTime<Utc>, retry_after: Option<Duration>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let exponent = self.consecutive_failures.saturating_sub(1).min(16);
        let mut window = self.base * 2_i32.pow(exponent);
        if window > self.max {
            window = self.max;
        }
        if let Some(retry_after) = retry_after.and_then(|d| ChronoDuration::from_std(d).ok()) {
            window = window.max(retry_after);
        }

        let candidate = now + window;
        self.until = Some(match self.until {
            Some(existing) if existing > candidate => existing,
            _ => candidate,
        });
    }

    /// Clear the window after a successful call.
    pub fn record_success(&mut self) {
        self.until = None;
        self.consecutive_failures = 0;
    }
}
