use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Configuration for retry behavior on transient errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Backoff before the first retry, doubled each subsequent retry.
    pub initial_backoff: Duration,
    /// Cap for exponential growth.
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Calculate the backoff duration before retry number `attempt` (1-indexed).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let backoff_ms = self.initial_backoff.as_millis() as u64 * 2u64.pow(attempt - 1);
        let capped_ms = backoff_ms.min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(capped_ms)
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is exhausted. Validation and conflict errors are never
/// retried; see `VaultError::is_transient`.
pub async fn retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let budget = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if !e.is_transient() || attempt >= budget {
                    return Err(e);
                }
                tracing::warn!(
                    operation,
                    attempt,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(config.backoff_for_attempt(attempt)).await;
            }
        }
    }
}
