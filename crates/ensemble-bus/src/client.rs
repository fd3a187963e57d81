use crate::backend::QueueBackend;
use crate::names::QueueNames;
use ensemble_core::{EnsembleResult, WireMessage};
use std::sync::Arc;
use std::time::Duration;

/// Typed, cheaply cloneable handle over a [`QueueBackend`].
///
/// Constructed once and passed to every component that talks to the queues.
#[derive(Clone)]
pub struct QueueClient {
    backend: Arc<dyn QueueBackend>,
    names: QueueNames,
}

impl QueueClient {
    pub fn new(backend: Arc<dyn QueueBackend>, names: QueueNames) -> Self {
        Self { backend, names }
    }

    pub fn names(&self) -> &QueueNames {
        &self.names
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    /// Validate, encode and append `msg` to `queue`.
    pub async fn send<M: WireMessage + Sync>(&self, queue: &str, msg: &M) -> EnsembleResult<()> {
        let payload = msg.encode()?;
        self.backend.push(queue, payload).await
    }

    /// Pop the next message from `queue` and decode it.
    ///
    /// A malformed payload is still consumed; the schema error is returned to
    /// the caller, which decides whether it is fatal.
    pub async fn recv<M: WireMessage>(&self, queue: &str) -> EnsembleResult<M> {
        let raw = self.backend.pop(queue).await?;
        M::decode(&raw)
    }

    /// Pop with a timeout. `Ok(None)` means the timeout elapsed.
    pub async fn recv_timeout<M: WireMessage>(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> EnsembleResult<Option<EnsembleResult<M>>> {
        let raw = self.backend.pop_timeout(queue, timeout).await?;
        Ok(raw.map(|raw| M::decode(&raw)))
    }

    pub async fn ping(&self) -> EnsembleResult<()> {
        self.backend.ping().await
    }
}
