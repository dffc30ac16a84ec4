// Bounded retry with exponential backoff and jitter.
//
// Attempt n (0-based) that fails transiently sleeps base * 2^n + jitter
// before attempt n+1. Non-transient failures return immediately. The total
// number of attempts never exceeds `max_attempts`.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Errors that know whether another attempt might succeed.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for maps_client::MapsError {
    fn is_transient(&self) -> bool {
        maps_client::MapsError::is_transient(self)
    }
}

impl Retryable for crate::error::EnrichError {
    fn is_transient(&self) -> bool {
        crate::error::EnrichError::is_transient(self)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Uniform jitter bounds in milliseconds, `[low, high)`.
    pub jitter_ms: (u64, u64),
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
            jitter_ms: (100, 1000),
        }
    }

    /// Same attempt ceiling with no sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_base: Duration::ZERO,
            jitter_ms: (0, 0),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the attempt following failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt));
        let (low, high) = self.jitter_ms;
        let jitter = if high > low {
            rand::rng().random_range(low..high)
        } else {
            low
        };
        backoff + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails non-transiently, or the attempt
    /// ceiling is reached. `op` receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        ?delay,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(call = label, attempts, error = %e, "giving up after attempt ceiling");
                    }
                    return Err(e);
                }
            }
        }
    }
}
