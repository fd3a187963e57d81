use crate::backends::ReasoningBackend;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult, RetryPolicy};
use tracing::{info, warn};

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(std::time::Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// A `ReasoningBackend` that wraps multiple backends and performs automatic
/// failover with exponential-backoff retries.
///
/// For each request it tries backends in order. Within each backend it retries
/// up to `max_retries` times for transient errors (see
/// [`EnsembleError::is_transient`]). If all retries on a backend are
/// exhausted, or a non-transient error is encountered, it moves to the next
/// backend. If every backend fails, the last error is returned.
pub struct FailoverBackend {
    backends: Vec<Box<dyn ReasoningBackend>>,
    policy: RetryPolicy,
    /// Injectable sleep function for testing (allows skipping real delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

impl FailoverBackend {
    /// Create a new failover backend with the given backends and retry policy.
    ///
    /// Returns a config error if `backends` is empty.
    pub fn new(backends: Vec<Box<dyn ReasoningBackend>>, policy: RetryPolicy) -> EnsembleResult<Self> {
        if backends.is_empty() {
            return Err(EnsembleError::Config(
                "FailoverBackend requires at least one backend".into(),
            ));
        }
        Ok(Self {
            backends,
            policy,
            #[cfg(test)]
            sleep_fn: None,
        })
    }

    async fn do_sleep(&self, delay: std::time::Duration) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(delay).await;
            return;
        }
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl ReasoningBackend for FailoverBackend {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> EnsembleResult<String> {
        let mut last_err: Option<EnsembleError> = None;

        for (backend_idx, backend) in self.backends.iter().enumerate() {
            let outcome = self
                .policy
                .retry(
                    || backend.complete(system_prompt, prompt),
                    EnsembleError::is_transient,
                    |attempt, e, delay| {
                        info!(
                            backend = backend_idx,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retryable error, backing off"
                        );
                        self.do_sleep(delay)
                    },
                )
                .await;
            match outcome {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(backend = backend_idx, error = %e, "Backend failed, moving to next backend");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| EnsembleError::Reasoning("All failover backends exhausted".into())))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
