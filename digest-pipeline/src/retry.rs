use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Source of time for pacing and backoff.
///
/// Production code uses [`TokioClock`]; tests swap in a virtual clock so that
/// retry schedules can be asserted without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded retry with doubling delays.
///
/// `max_attempts` counts every call, the first one included. The delay
/// before retry `k` (1-based) is `base_delay * 2^(k-1)`.
pub struct RetryPolicy<E> {
    pub max_attempts: u32,
    pub base_delay: Duration,
    is_retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            is_retryable: self.is_retryable,
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

impl<E: fmt::Display> RetryPolicy<E> {
    pub fn new(max_attempts: u32, base_delay: Duration, is_retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            is_retryable,
        }
    }

    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, clock: &dyn Clock, label: &str, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if !(self.is_retryable)(&e) => {
                    debug!("{} failed with non-retryable error: {}", label, e);
                    return Err(e);
                }
                Err(e) if tries >= self.max_attempts => {
                    warn!("{} failed after {} attempts: {}", label, tries, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff_delay(tries);
                    warn!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        label, tries, self.max_attempts, e, delay
                    );
                    clock.sleep(delay).await;
                }
            }
        }
    }
}

/// Enforces a minimum spacing between consecutive outbound calls.
///
/// The last-call time starts at construction, so even the very first call
/// waits out `min_interval`. Concurrent callers are serialised by the lock.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: &dyn Clock) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(clock.now()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn pace(&self, clock: &dyn Clock) {
        let mut last_call = self.last_call.lock().await;

        let elapsed = clock.now().saturating_duration_since(*last_call);
        if elapsed < self.min_interval {
            let wait_time = self.min_interval - elapsed;
            debug!("Rate limiting oracle call: waiting {:?}", wait_time);
            clock.sleep(wait_time).await;
        }

        *last_call = clock.now();
    }
}
