use crate::artifacts::ArtifactStore;
use crate::collector::{Collection, CollectionOutcome, Collector};
use crate::config::OrchestratorConfig;
use crate::dispatcher::Dispatcher;
use crate::judge::Judge;
use crate::ledger::{TaskRecord, TaskStore};
use crate::planner::Planner;
use crate::tracker::TaskTracker;
use ensemble_bus::QueueClient;
use ensemble_core::{
    ApprovalMessage, EnsembleError, EnsembleResult, SubtaskStatus, TaskStatus, Verdict,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything one task's pipeline needs; shared by all pipelines.
pub(crate) struct Pipeline {
    pub client: QueueClient,
    pub planner: Arc<dyn Planner>,
    pub judge: Arc<dyn Judge>,
    pub dispatcher: Dispatcher,
    pub collector: Arc<Collector>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub ledger: Arc<dyn TaskStore>,
    pub tracker: TaskTracker,
    pub config: OrchestratorConfig,
}

impl Pipeline {
    /// Run `record` from its current status to `Approved` or `Failed`.
    ///
    /// The caller must already hold the tracker claim for the task. Errors
    /// never escape: they fail this task only and are logged with its id.
    pub async fn drive(&self, mut record: TaskRecord) -> TaskRecord {
        let task_id = record.id().clone();
        match self.advance(&mut record).await {
            Ok(()) => {
                info!(task_id = %task_id, "Task approved");
                self.tracker.finish_approved(&task_id).await;
            }
            Err(err) => {
                let kind = err.kind();
                error!(task_id = %task_id, error_kind = %kind, error = %err, "Task failed");
                match record.task.fail(&err) {
                    Ok(()) => {
                        if let Err(e) = self.ledger.save(&record).await {
                            error!(task_id = %task_id, error = %e, "Could not record task failure");
                        }
                    }
                    Err(e) => warn!(task_id = %task_id, error = %e, "Task already terminal"),
                }
                self.tracker.finish_failed(&task_id, kind).await;
            }
        }
        record
    }

    async fn advance(&self, record: &mut TaskRecord) -> EnsembleResult<()> {
        let mut dispatched: Option<Collection> = None;
        loop {
            match record.task.status {
                TaskStatus::Pending => {
                    let plan = self.planner.plan(&record.task).await?;
                    info!(task_id = %record.id(), subtasks = plan.len(), "Task planned");
                    record.task.attach_plan(&plan);
                    self.transition(record, TaskStatus::Planned).await?;
                }
                TaskStatus::Planned => {
                    // A fresh run id, also when a dispatch interrupted by a
                    // crash is repeated: results of the lost run are stale.
                    record.task.begin_attempt();
                    let collection = self.dispatcher.dispatch(&record.task).await?;
                    dispatched = Some(collection);
                    self.transition(record, TaskStatus::Dispatched).await?;
                }
                TaskStatus::Dispatched | TaskStatus::Collecting => {
                    let collection = match dispatched.take() {
                        Some(collection) => collection,
                        // Resumed after a restart: results are still waiting
                        // in the task's result queue.
                        None => self
                            .collector
                            .expect(&record.task.id, record.task.subtask_names())?
                            .with_attempt(record.task.attempt.clone()),
                    };
                    if record.task.status == TaskStatus::Dispatched {
                        record.task.set_all_subtasks(SubtaskStatus::Running);
                        self.transition(record, TaskStatus::Collecting).await?;
                    }
                    let outcome = collection.collect(self.config.collect_deadline()).await?;
                    self.judge_outcome(record, outcome).await?;
                }
                TaskStatus::Judged => {
                    self.finalize(record).await?;
                }
                TaskStatus::Approved | TaskStatus::Failed => return Ok(()),
            }
        }
    }

    async fn judge_outcome(
        &self,
        record: &mut TaskRecord,
        outcome: CollectionOutcome,
    ) -> EnsembleResult<()> {
        if outcome.is_partial() {
            self.tracker.record_partial().await;
        }
        let (results, missing) = outcome.into_parts();
        for result in &results {
            let status = if result.success {
                SubtaskStatus::Completed
            } else {
                SubtaskStatus::Failed
            };
            record.task.set_subtask_status(&result.subtask_name, status);
        }
        for name in &missing {
            record.task.set_subtask_status(name, SubtaskStatus::TimedOut);
        }

        let judgement = self.judge.judge(&record.task, &results, &missing).await?;
        record.verdict = Some(Verdict::new(record.task.id.clone(), judgement, missing));
        self.transition(record, TaskStatus::Judged).await
    }

    /// Persist the report and bundle, then hand the bundle to the approval queue.
    async fn finalize(&self, record: &mut TaskRecord) -> EnsembleResult<()> {
        let verdict = record.verdict.clone().ok_or_else(|| {
            EnsembleError::Store(format!("task {} is judged but has no verdict", record.id()))
        })?;
        let task_id = record.task.id.clone();
        let bundle = serde_json::to_string_pretty(&verdict.bundle)?;

        let (id, report, bundle) = (&task_id, verdict.report.as_str(), bundle.as_str());
        self.retrying("persist artifacts", || async move {
            self.artifacts
                .save(id, &self.config.report_filename, report)
                .await?;
            self.artifacts
                .save(id, &self.config.bundle_filename, bundle)
                .await?;
            Ok::<(), EnsembleError>(())
        })
        .await?;
        info!(task_id = %task_id, partial = verdict.is_partial(), "Artifacts persisted");

        let approval = ApprovalMessage {
            id: task_id.clone(),
            bundle: verdict.bundle_value(),
        };
        let queue = self.client.names().approval.clone();
        self.retrying("enqueue approval", || self.client.send(&queue, &approval))
            .await?;

        self.transition(record, TaskStatus::Approved).await
    }

    /// Apply a status change, then checkpoint it.
    async fn transition(&self, record: &mut TaskRecord, next: TaskStatus) -> EnsembleResult<()> {
        record.task.advance(next)?;
        self.checkpoint(record).await?;
        if !next.is_terminal() {
            self.tracker.update(&record.task.id, next).await;
        }
        info!(task_id = %record.id(), status = %next, "Task transitioned");
        Ok(())
    }

    /// Write `record` to the ledger, retrying transient store failures.
    pub async fn checkpoint(&self, record: &TaskRecord) -> EnsembleResult<()> {
        self.retrying("checkpoint task", || self.ledger.save(record))
            .await
    }

    async fn retrying<T, F, Fut>(&self, what: &str, op: F) -> EnsembleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EnsembleResult<T>>,
    {
        self.config
            .persist_retry
            .retry(
                op,
                |_| true,
                |attempt, e, delay| {
                    warn!(
                        operation = what,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying"
                    );
                    tokio::time::sleep(delay)
                },
            )
            .await
    }
}
