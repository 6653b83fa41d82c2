//! Retry with exponential backoff, independent of what is being retried

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

pub struct RetryPolicy<E> {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: u32,
    retryable: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("multiplier", &self.multiplier)
            .finish_non_exhaustive()
    }
}

impl<E: fmt::Display> RetryPolicy<E> {
    pub fn new(retryable: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable,
        }
    }

    /// Total attempts, including the first. Zero is treated as one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, err: &E) -> bool {
        (self.retryable)(err)
    }

    /// Wait before attempt `attempt + 1`, counting attempts from 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    /// Every wait the policy can perform, in order
    pub fn backoff_sequence(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|attempt| self.backoff(attempt)).collect()
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts run out. `op` receives the attempt number, starting at 1.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            debug!(attempt, max_attempts = self.max_attempts, "Attempting {}", label);

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable(&err) {
                error!(error = %err, "Non-retryable error during {}", label);
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    error = %err,
                    "{} failed after {} attempts",
                    label, self.max_attempts
                );
                return Err(err);
            }

            let delay = self.backoff(attempt);
            warn!(
                error = %err,
                "Attempt {}/{} failed for {}. Retrying in {:?}",
                attempt, self.max_attempts, label, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
