use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use super::ApiError;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * attempt`
    Linear,
    /// `base * factor^(attempt - 1)`
    Exponential { factor: u32 },
}

/// Retry policy shared by every HTTP client.
///
/// Only errors for which [`ApiError::is_retryable`] holds (429s and transport
/// failures) are retried; anything else is returned immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Linear,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, factor: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff: Backoff::Exponential { factor: factor.max(1) },
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential { factor } => {
                let multiplier = factor.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(multiplier)
            }
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned in the latter case.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    if matches!(e, ApiError::RateLimited { .. }) {
                        warn!("⏳ {}: 429 rate limit, sleeping {:?} (attempt {}/{})", label, delay, attempt, self.max_attempts);
                    } else {
                        warn!("⚠️ {}: {} - retrying in {:?} (attempt {}/{})", label, e, delay, attempt, self.max_attempts);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        error!("❌ {} failed after {} attempts: {}", label, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(5, Duration::from_secs(2))
    }
}
