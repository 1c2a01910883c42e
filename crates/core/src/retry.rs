//! Bounded retry with exponential backoff
//!
//! Used by the persistence path: writes to the model store are retried at
//! most once before the model is left dirty for the next flush cycle.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means only the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds for the first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds to cap exponential growth
    pub max_delay_ms: u64,
    /// Whether to add random jitter to delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64, jitter: bool) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            jitter,
        }
    }

    /// Policy for model-store writes: a single retry, short delay. A failed
    /// write leaves the model dirty, so the next flush is the real backstop.
    pub fn persistence() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter: true,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let mut delay_ms = exp.min(self.max_delay_ms);
        if self.jitter && delay_ms > 0 {
            use rand::Rng;
            delay_ms = rand::thread_rng().gen_range(delay_ms / 2..=delay_ms);
        }
        Duration::from_millis(delay_ms)
    }
}

/// Retry an async operation with exponential backoff
///
/// `should_retry` decides per error whether another attempt is worthwhile.
/// Returns the last error once attempts are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    mut operation: F,
    policy: RetryPolicy,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !should_retry(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(
                    "Retrying after error (attempt {}/{}, backoff {:?})",
                    attempt + 1,
                    policy.max_retries,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
