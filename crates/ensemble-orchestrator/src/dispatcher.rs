use crate::collector::{Collection, Collector};
use ensemble_bus::QueueClient;
use ensemble_core::{DispatchMessage, EnsembleError, EnsembleResult, Task, WireMessage};
use std::sync::Arc;
use tracing::{info, warn};

/// Fans a planned task out to its agents' queues.
pub struct Dispatcher {
    client: QueueClient,
    collector: Arc<Collector>,
}

impl Dispatcher {
    pub fn new(client: QueueClient, collector: Arc<Collector>) -> Self {
        Self { client, collector }
    }

    /// One dispatch message per subtask, in plan order.
    pub fn messages(task: &Task) -> Vec<DispatchMessage> {
        task.subtasks
            .iter()
            .map(|s| DispatchMessage {
                task_id: task.id.clone(),
                subtask_name: s.name.clone(),
                agent: s.agent.clone(),
                params: s.params.clone(),
                attempt: task.attempt.clone(),
            })
            .collect()
    }

    /// Register the task's expected results, then enqueue every subtask at once.
    ///
    /// The task's result queue is emptied in the same step, so results left
    /// over from an earlier run of the same id cannot satisfy this one.
    /// Either all subtasks are delivered or none are. On failure the returned
    /// error is `Dispatch` and the registration is released.
    pub async fn dispatch(&self, task: &Task) -> EnsembleResult<Collection> {
        let dispatch_error = |reason: String| EnsembleError::Dispatch {
            task_id: task.id.clone(),
            reason,
        };

        let mut batch = Vec::with_capacity(task.subtasks.len());
        for msg in Self::messages(task) {
            let payload = msg.encode().map_err(|e| dispatch_error(e.to_string()))?;
            batch.push((self.client.names().agent_queue(&msg.agent), payload));
        }

        let collection = self
            .collector
            .expect(&task.id, task.subtask_names())?
            .with_attempt(task.attempt.clone());

        let count = batch.len();
        let results_queue = self.client.names().result_queue(&task.id);
        if let Err(e) = self
            .client
            .backend()
            .push_batch(std::slice::from_ref(&results_queue), batch)
            .await
        {
            warn!(task_id = %task.id, error = %e, "Dispatch rolled back");
            return Err(dispatch_error(e.to_string()));
        }
        info!(
            task_id = %task.id,
            attempt = task.attempt.as_deref().unwrap_or_default(),
            subtasks = count,
            "Subtasks dispatched"
        );
        Ok(collection)
    }
}
