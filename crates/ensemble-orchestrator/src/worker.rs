use async_trait::async_trait;
use ensemble_bus::QueueClient;
use ensemble_core::{DispatchMessage, EnsembleResult, ResultMessage, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The capability behind a worker agent.
#[async_trait]
pub trait SubtaskHandler: Send + Sync {
    /// Produce the subtask's output. An error becomes a `success:false` result.
    async fn handle(&self, dispatch: &DispatchMessage) -> EnsembleResult<serde_json::Value>;
}

#[async_trait]
impl<F, Fut> SubtaskHandler for F
where
    F: Fn(DispatchMessage) -> Fut + Send + Sync,
    Fut: Future<Output = EnsembleResult<serde_json::Value>> + Send + 'static,
{
    async fn handle(&self, dispatch: &DispatchMessage) -> EnsembleResult<serde_json::Value> {
        (self)(dispatch.clone()).await
    }
}

/// Harness for the worker side of the queue contract.
///
/// Pops from `queue:<agent>` and posts exactly one result per subtask to the
/// task's result queue, including when the handler fails.
pub struct AgentWorker {
    agent: String,
    client: QueueClient,
    handler: Arc<dyn SubtaskHandler>,
    retry: RetryPolicy,
}

impl AgentWorker {
    pub fn new(agent: impl Into<String>, client: QueueClient, handler: Arc<dyn SubtaskHandler>) -> Self {
        Self {
            agent: agent.into(),
            client,
            handler,
            retry: RetryPolicy::default(),
        }
    }

    /// Handle at most one subtask, waiting up to `timeout` for it.
    /// Returns false if nothing arrived.
    pub async fn process_one(&self, timeout: Duration) -> EnsembleResult<bool> {
        let queue = self.client.names().agent_queue(&self.agent);
        let dispatch = match self
            .client
            .recv_timeout::<DispatchMessage>(&queue, timeout)
            .await?
        {
            None => return Ok(false),
            Some(Ok(dispatch)) => dispatch,
            Some(Err(e)) => {
                // Without a task id there is nowhere to report to.
                warn!(agent = %self.agent, error = %e, "Dropping malformed subtask");
                return Ok(true);
            }
        };

        let result = match self.handler.handle(&dispatch).await {
            Ok(output) => ResultMessage::success(&dispatch, output),
            Err(e) => {
                warn!(
                    agent = %self.agent,
                    task_id = %dispatch.task_id,
                    subtask = %dispatch.subtask_name,
                    error = %e,
                    "Subtask failed"
                );
                ResultMessage::failure(&dispatch, e.to_string())
            }
        };

        let result_queue = self.client.names().result_queue(&dispatch.task_id);
        self.client.send(&result_queue, &result).await?;
        info!(
            agent = %self.agent,
            task_id = %dispatch.task_id,
            subtask = %dispatch.subtask_name,
            success = result.success,
            "Result posted"
        );
        Ok(true)
    }

    /// Serve subtasks until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> EnsembleResult<()> {
        info!(agent = %self.agent, "Worker started");
        let mut attempt: u32 = 0;
        while !shutdown.is_cancelled() {
            match self.process_one(Duration::from_secs(1)).await {
                Ok(_) => attempt = 0,
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    warn!(agent = %self.agent, error = %e, delay_ms = delay.as_millis() as u64, "Worker backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        info!(agent = %self.agent, "Worker stopped");
        Ok(())
    }
}
