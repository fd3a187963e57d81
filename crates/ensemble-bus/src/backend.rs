use async_trait::async_trait;
use ensemble_core::EnsembleResult;
use std::time::Duration;

/// A durable FIFO per named queue.
///
/// `pop` removes exactly one message and hands it to exactly one caller, so
/// any number of consumers can compete on the same queue without extra locking.
/// Implementations must never busy-wait while a queue is empty.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Append a message to the tail of `queue`.
    async fn push(&self, queue: &str, payload: String) -> EnsembleResult<()>;

    /// Empty every queue in `clear`, then append every `(queue, payload)`
    /// pair, as one step: either all of it happens or none of it does.
    async fn push_batch(&self, clear: &[String], items: Vec<(String, String)>) -> EnsembleResult<()>;

    /// Wait until `queue` has a message, then remove and return the head.
    async fn pop(&self, queue: &str) -> EnsembleResult<String>;

    /// Like [`pop`](Self::pop), but gives up after `timeout` and returns `None`.
    ///
    /// Unlike wrapping `pop` in `tokio::time::timeout`, an expiry here never
    /// drops a message that was already removed from the queue.
    async fn pop_timeout(&self, queue: &str, timeout: Duration) -> EnsembleResult<Option<String>>;

    /// Drop every message in `queue`.
    async fn purge(&self, queue: &str) -> EnsembleResult<()>;

    /// Number of messages waiting in `queue`.
    async fn len(&self, queue: &str) -> EnsembleResult<usize>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> EnsembleResult<()>;
}
