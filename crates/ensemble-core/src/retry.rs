use crate::error::{EnsembleError, EnsembleResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Exponential backoff settings shared by every retrying call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Cap on a single delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately; used by tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based), capped at `backoff_max_ms`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// `max_retries` retries are spent; the last error is returned.
    ///
    /// Before each retry `wait(attempt, &error, delay)` is awaited. Callers log
    /// there and sleep for `delay`.
    pub async fn retry<T, Op, Fut, Wait, WaitFut>(
        &self,
        mut op: Op,
        retryable: impl Fn(&EnsembleError) -> bool,
        mut wait: Wait,
    ) -> EnsembleResult<T>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = EnsembleResult<T>>,
        Wait: FnMut(u32, &EnsembleError, Duration) -> WaitFut,
        WaitFut: Future<Output = ()>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && retryable(&e) => {
                    wait(attempt, &e, self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
