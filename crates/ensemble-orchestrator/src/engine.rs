use crate::artifacts::{ArtifactStore, InMemoryArtifactStore};
use crate::collector::Collector;
use crate::config::OrchestratorConfig;
use crate::dispatcher::Dispatcher;
use crate::judge::Judge;
use crate::ledger::{MemoryTaskStore, TaskRecord, TaskStore};
use crate::pipeline::Pipeline;
use crate::planner::Planner;
use crate::tracker::TaskTracker;
use ensemble_bus::{QueueBackend, QueueClient};
use ensemble_core::{EnsembleError, EnsembleResult, IncomingTask, Task, TaskId, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long one ingestion pop blocks before re-checking for shutdown.
const INGEST_POLL: Duration = Duration::from_secs(1);

/// The orchestrator loop.
/// Pulls tasks from the incoming queue and runs plan → dispatch → collect →
/// judge → persist → approve for each one as an independent pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
}

/// Builder for [`Orchestrator`]. Stores default to in-memory.
pub struct OrchestratorBuilder {
    backend: Arc<dyn QueueBackend>,
    planner: Arc<dyn Planner>,
    judge: Arc<dyn Judge>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    ledger: Option<Arc<dyn TaskStore>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn TaskStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn build(self) -> Orchestrator {
        let client = QueueClient::new(self.backend, self.config.queues.clone());
        let collector = Arc::new(Collector::new(
            client.clone(),
            self.config.connection_retry.clone(),
        ));
        let pipeline = Pipeline {
            dispatcher: Dispatcher::new(client.clone(), collector.clone()),
            client,
            planner: self.planner,
            judge: self.judge,
            collector,
            artifacts: self
                .artifacts
                .unwrap_or_else(|| Arc::new(InMemoryArtifactStore::new())),
            ledger: self.ledger.unwrap_or_else(|| Arc::new(MemoryTaskStore::new())),
            tracker: TaskTracker::new(),
            config: self.config,
        };
        Orchestrator {
            pipeline: Arc::new(pipeline),
        }
    }
}

impl Orchestrator {
    pub fn builder(
        backend: Arc<dyn QueueBackend>,
        planner: Arc<dyn Planner>,
        judge: Arc<dyn Judge>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            backend,
            planner,
            judge,
            artifacts: None,
            ledger: None,
            config: OrchestratorConfig::default(),
        }
    }

    /// Queue client configured with this orchestrator's queue names.
    pub fn client(&self) -> &QueueClient {
        &self.pipeline.client
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.pipeline.tracker
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.pipeline.config
    }

    /// Push a task onto the incoming queue.
    pub async fn submit(&self, id: TaskId, payload: serde_json::Value) -> EnsembleResult<()> {
        let incoming = IncomingTask { id, payload };
        let queue = &self.pipeline.client.names().incoming;
        self.pipeline.client.send(queue, &incoming).await?;
        info!(task_id = %incoming.id, "Task submitted");
        Ok(())
    }

    /// Run one incoming task to completion.
    ///
    /// Errors only if a pipeline for the same id is already running or the
    /// initial checkpoint cannot be written; every later failure is recorded
    /// on the returned task instead.
    pub async fn process(&self, incoming: IncomingTask) -> EnsembleResult<TaskRecord> {
        let task_id = incoming.id.clone();
        if !self
            .pipeline
            .tracker
            .begin(&task_id, TaskStatus::Pending)
            .await
        {
            return Err(EnsembleError::DuplicateTask(task_id));
        }
        info!(task_id = %task_id, "Task received");

        let record = TaskRecord::new(Task::new(incoming.id, incoming.payload));
        if let Err(e) = self.pipeline.checkpoint(&record).await {
            self.pipeline.tracker.release(&task_id).await;
            return Err(e);
        }
        Ok(self.pipeline.drive(record).await)
    }

    /// Resume every unfinished ledger record and wait for all of them.
    ///
    /// Records already claimed by a running pipeline are skipped, so calling
    /// this again once everything finished is a no-op.
    pub async fn recover(&self) -> EnsembleResult<Vec<TaskRecord>> {
        let mut resumed = JoinSet::new();
        for record in self.claim_unfinished().await? {
            let pipeline = self.pipeline.clone();
            resumed.spawn(async move { pipeline.drive(record).await });
        }

        let mut records = Vec::with_capacity(resumed.len());
        while let Some(joined) = resumed.join_next().await {
            match joined {
                Ok(record) => records.push(record),
                Err(e) => log_join_error(e),
            }
        }
        Ok(records)
    }

    /// Cancel a task that is waiting for worker results. It ends up `Failed`
    /// with kind `cancelled`. Returns false if the task is not collecting.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        let cancelled = self.pipeline.collector.cancel(task_id);
        if cancelled {
            info!(task_id = %task_id, "Cancellation requested");
        }
        cancelled
    }

    /// Current status: live for in-flight tasks, otherwise from the ledger.
    pub async fn status(&self, task_id: &TaskId) -> EnsembleResult<Option<TaskStatus>> {
        if let Some(status) = self.pipeline.tracker.get(task_id).await {
            return Ok(Some(status));
        }
        Ok(self
            .pipeline
            .ledger
            .get(task_id)
            .await?
            .map(|record| record.task.status))
    }

    /// Run until `shutdown` is cancelled, then drain in-flight tasks.
    ///
    /// Fails only if the queue backend is unreachable at startup or the
    /// ledger cannot be read. Later connection errors are retried forever.
    pub async fn run(&self, shutdown: CancellationToken) -> EnsembleResult<()> {
        self.pipeline.client.ping().await?;

        let config = &self.pipeline.config;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1)));
        let mut inflight = JoinSet::new();

        for record in self.claim_unfinished().await? {
            let pipeline = self.pipeline.clone();
            let semaphore = semaphore.clone();
            inflight.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                pipeline.drive(record).await;
            });
        }

        let incoming_queue = self.pipeline.client.names().incoming.clone();
        info!(
            queue = %incoming_queue,
            max_concurrent_tasks = config.max_concurrent_tasks,
            "Orchestrator loop started"
        );

        let mut attempt: u32 = 0;
        loop {
            while let Some(joined) = inflight.try_join_next() {
                if let Err(e) = joined {
                    log_join_error(e);
                }
            }

            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if shutdown.is_cancelled() {
                break;
            }

            match self
                .pipeline
                .client
                .recv_timeout::<IncomingTask>(&incoming_queue, INGEST_POLL)
                .await
            {
                Ok(None) => {}
                Ok(Some(Ok(incoming))) => {
                    attempt = 0;
                    let this = self.clone();
                    inflight.spawn(async move {
                        let _permit = permit;
                        let task_id = incoming.id.clone();
                        if let Err(e) = this.process(incoming).await {
                            warn!(task_id = %task_id, error_kind = %e.kind(), error = %e, "Task not started");
                        }
                    });
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "Dropping malformed incoming message");
                }
                Err(e) => {
                    let delay = config.connection_retry.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    if e.is_transient() {
                        warn!(error = %e, delay_ms = delay.as_millis() as u64, "Incoming queue unavailable, backing off");
                    } else {
                        error!(error = %e, delay_ms = delay.as_millis() as u64, "Incoming queue read failed");
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(in_flight = inflight.len(), "Shutting down, draining in-flight tasks");
        while let Some(joined) = inflight.join_next().await {
            if let Err(e) = joined {
                log_join_error(e);
            }
        }
        info!("Orchestrator stopped");
        Ok(())
    }

    async fn claim_unfinished(&self) -> EnsembleResult<Vec<TaskRecord>> {
        let mut claimed = Vec::new();
        for record in self.pipeline.ledger.list_unfinished().await? {
            if self
                .pipeline
                .tracker
                .begin(record.id(), record.task.status)
                .await
            {
                info!(task_id = %record.id(), status = %record.task.status, "Resuming task");
                claimed.push(record);
            }
        }
        Ok(claimed)
    }
}

fn log_join_error(e: JoinError) {
    error!(error = %e, "Task pipeline aborted");
}
