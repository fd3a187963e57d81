use ensemble_bus::QueueClient;
use ensemble_core::{EnsembleError, EnsembleResult, ResultMessage, RetryPolicy, TaskId, TaskResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a collection ended.
///
/// A deadline expiry is not an error: judging proceeds on whatever arrived and
/// the missing subtasks are passed along.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    /// Every expected subtask reported.
    Complete(Vec<TaskResult>),
    /// The deadline elapsed first.
    PartialTimeout {
        results: Vec<TaskResult>,
        missing: Vec<String>,
    },
}

impl CollectionOutcome {
    pub fn results(&self) -> &[TaskResult] {
        match self {
            CollectionOutcome::Complete(results) => results,
            CollectionOutcome::PartialTimeout { results, .. } => results,
        }
    }

    pub fn missing(&self) -> &[String] {
        match self {
            CollectionOutcome::Complete(_) => &[],
            CollectionOutcome::PartialTimeout { missing, .. } => missing,
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, CollectionOutcome::PartialTimeout { .. })
    }

    pub fn into_parts(self) -> (Vec<TaskResult>, Vec<String>) {
        match self {
            CollectionOutcome::Complete(results) => (results, Vec::new()),
            CollectionOutcome::PartialTimeout { results, missing } => (results, missing),
        }
    }
}

type Registry = Arc<Mutex<HashMap<TaskId, CancellationToken>>>;

/// Registry of in-flight result collections, one per task.
///
/// Each task reads from its own result queue, so a silent worker on one task
/// never delays another.
pub struct Collector {
    client: QueueClient,
    retry: RetryPolicy,
    active: Registry,
}

impl Collector {
    pub fn new(client: QueueClient, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register the subtask names a task is waiting for.
    ///
    /// Must be called before any of the task's subtasks are enqueued, so that
    /// no result can arrive for an unregistered task.
    pub fn expect(&self, task_id: &TaskId, expected: BTreeSet<String>) -> EnsembleResult<Collection> {
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock();
            if active.contains_key(task_id) {
                return Err(EnsembleError::DuplicateTask(task_id.clone()));
            }
            active.insert(task_id.clone(), cancel.clone());
        }
        debug!(task_id = %task_id, expected = expected.len(), "Collection registered");

        Ok(Collection {
            task_id: task_id.clone(),
            queue: self.client.names().result_queue(task_id),
            expected,
            received: BTreeMap::new(),
            attempt: None,
            client: self.client.clone(),
            retry: self.retry.clone(),
            cancel,
            registry: self.active.clone(),
        })
    }

    /// Cancel an active collection. Returns false if the task is not collecting.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        match self.active.lock().get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, task_id: &TaskId) -> bool {
        self.active.lock().contains_key(task_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Expected and received results for one task.
///
/// Dropping the handle releases the task's registry entry.
pub struct Collection {
    task_id: TaskId,
    queue: String,
    expected: BTreeSet<String>,
    received: BTreeMap<String, TaskResult>,
    attempt: Option<String>,
    client: QueueClient,
    retry: RetryPolicy,
    cancel: CancellationToken,
    registry: Registry,
}

impl Collection {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn expected(&self) -> &BTreeSet<String> {
        &self.expected
    }

    /// Only accept results tagged with `attempt`. Untagged results still count.
    pub fn with_attempt(mut self, attempt: Option<String>) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.expected.iter().all(|name| self.received.contains_key(name))
    }

    /// Expected subtasks with no result yet, in name order.
    pub fn missing(&self) -> Vec<String> {
        self.expected
            .iter()
            .filter(|name| !self.received.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Record one result. Returns false if it was discarded.
    ///
    /// A repeated result for the same subtask replaces the earlier one.
    pub fn accept(&mut self, msg: ResultMessage) -> bool {
        if msg.task_id != self.task_id {
            warn!(
                task_id = %self.task_id,
                foreign_task = %msg.task_id,
                "Discarding result for another task"
            );
            return false;
        }
        if let (Some(current), Some(theirs)) = (&self.attempt, &msg.attempt) {
            if current != theirs {
                warn!(
                    task_id = %self.task_id,
                    subtask = %msg.subtask_name,
                    stale_attempt = %theirs,
                    "Discarding result from an earlier run"
                );
                return false;
            }
        }
        if !self.expected.contains(&msg.subtask_name) {
            warn!(
                task_id = %self.task_id,
                subtask = %msg.subtask_name,
                "Discarding result for unexpected subtask"
            );
            return false;
        }
        debug!(
            task_id = %self.task_id,
            subtask = %msg.subtask_name,
            success = msg.success,
            "Result received"
        );
        if self
            .received
            .insert(msg.subtask_name.clone(), TaskResult::from(msg))
            .is_some()
        {
            debug!(task_id = %self.task_id, "Replaced earlier result for subtask");
        }
        true
    }

    /// Read results until every expected subtask reported or `deadline` elapses.
    ///
    /// Connection errors are retried with backoff, never past the deadline.
    /// Fails only with `Cancelled` or a non-transient backend error.
    pub async fn collect(mut self, deadline: Duration) -> EnsembleResult<CollectionOutcome> {
        let deadline_at = Instant::now() + deadline;
        let mut attempt: u32 = 0;

        while !self.is_complete() {
            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let popped = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.finish().await;
                    return Err(EnsembleError::Cancelled(self.task_id.clone()));
                }
                popped = self.client.recv_timeout::<ResultMessage>(&self.queue, remaining) => popped,
            };

            match popped {
                Ok(Some(Ok(msg))) => {
                    attempt = 0;
                    self.accept(msg);
                }
                Ok(Some(Err(e))) => {
                    warn!(task_id = %self.task_id, error = %e, "Discarding malformed result");
                }
                Ok(None) => break,
                Err(e) if e.is_transient() => {
                    let delay = self.retry.delay_for(attempt).min(remaining);
                    attempt = attempt.saturating_add(1);
                    warn!(
                        task_id = %self.task_id,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Result queue unavailable, backing off"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    self.finish().await;
                    return Err(e);
                }
            }
        }

        self.finish().await;
        let missing = self.missing();
        let results: Vec<TaskResult> = std::mem::take(&mut self.received).into_values().collect();
        if missing.is_empty() {
            info!(task_id = %self.task_id, results = results.len(), "Collection complete");
            Ok(CollectionOutcome::Complete(results))
        } else {
            warn!(
                task_id = %self.task_id,
                results = results.len(),
                missing = ?missing,
                "Collection deadline reached with subtasks missing"
            );
            Ok(CollectionOutcome::PartialTimeout { results, missing })
        }
    }

    async fn finish(&self) {
        if let Err(e) = self.client.backend().purge(&self.queue).await {
            debug!(task_id = %self.task_id, error = %e, "Could not purge result queue");
        }
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.task_id);
    }
}
