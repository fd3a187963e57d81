use ensemble_core::{ErrorKind, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Counters across every task this process has handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub started: u64,
    pub approved: u64,
    pub failed: u64,
    /// Approved or failed after collecting only part of the results.
    pub partial: u64,
    pub failures_by_kind: HashMap<ErrorKind, u64>,
}

/// Live status of in-flight tasks plus aggregate metrics.
///
/// Terminal tasks are dropped from the live map; the ledger remembers them.
pub struct TaskTracker {
    states: Arc<RwLock<HashMap<TaskId, TaskStatus>>>,
    metrics: Arc<RwLock<PipelineMetrics>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            metrics: Arc::new(RwLock::new(PipelineMetrics::default())),
        }
    }

    /// Claim `task_id` for a pipeline. False if one is already running for it.
    pub async fn begin(&self, task_id: &TaskId, status: TaskStatus) -> bool {
        let mut states = self.states.write().await;
        if states.contains_key(task_id) {
            return false;
        }
        states.insert(task_id.clone(), status);
        drop(states);
        self.metrics.write().await.started += 1;
        true
    }

    /// Record a non-terminal transition.
    pub async fn update(&self, task_id: &TaskId, status: TaskStatus) {
        let mut states = self.states.write().await;
        if let Some(current) = states.get_mut(task_id) {
            *current = status;
        }
    }

    pub async fn record_partial(&self) {
        self.metrics.write().await.partial += 1;
    }

    pub async fn finish_approved(&self, task_id: &TaskId) {
        self.states.write().await.remove(task_id);
        self.metrics.write().await.approved += 1;
    }

    pub async fn finish_failed(&self, task_id: &TaskId, kind: ErrorKind) {
        self.states.write().await.remove(task_id);
        let mut metrics = self.metrics.write().await;
        metrics.failed += 1;
        *metrics.failures_by_kind.entry(kind).or_default() += 1;
    }

    /// Release a claim without counting an outcome.
    pub async fn release(&self, task_id: &TaskId) {
        self.states.write().await.remove(task_id);
    }

    pub async fn get(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.states.read().await.get(task_id).copied()
    }

    pub async fn in_flight(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn metrics(&self) -> PipelineMetrics {
        self.metrics.read().await.clone()
    }
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}
