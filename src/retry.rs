//! Backoff policy shared by connection attempts and the reconnect loop.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

/// Attempt budget and exponential backoff.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first one. For
    /// [`StreamDriver`](crate::stream::driver::StreamDriver) this is the
    /// budget of consecutive failed connects.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    /// Cap for the doubled delay, before jitter.
    pub max_backoff: Duration,
    /// Upper bound for the random amount added to each delay.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Backoff used by the reconnect loop. Starts small for dropped
    /// connections and caps at 16 seconds.
    pub fn reconnect() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(16),
            jitter: Duration::from_millis(250),
        }
    }

    /// Backoff after the server rejects a connect with an HTTP error status.
    /// Starts at 10 seconds and caps at 240 seconds.
    pub fn http_error() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(240),
            jitter: Duration::from_secs(1),
        }
    }

    /// Delay before retrying after `attempt` (1-based) failed.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay(attempt) + jitter_duration(self.jitter, attempt)
    }

    fn base_delay(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_backoff.min(self.max_backoff);
        for _ in 1..attempt {
            if delay >= self.max_backoff {
                break;
            }
            delay = delay.saturating_mul(2).min(self.max_backoff);
        }
        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::reconnect()
    }
}

/// Runs `op` until it succeeds, `should_retry` rejects the error, or the
/// policy's attempts are spent. `op` receives the 1-based attempt number.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= max_attempts || !should_retry(&error) {
            return Err(error);
        }

        let delay = policy.delay_for_attempt(attempt);
        debug!(
            event = "connect_attempt_failed",
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        attempt += 1;
    }
}

/// Awaits `future` for at most `timeout`.
pub async fn with_timeout<T, Fut>(
    timeout: Duration,
    future: Fut,
) -> Result<T, tokio::time::error::Elapsed>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(timeout, future).await
}

fn jitter_duration(max_jitter: Duration, attempt: usize) -> Duration {
    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    if limit_nanos == 0 {
        return Duration::ZERO;
    }

    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ ((attempt as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % (limit_nanos + 1))
}
