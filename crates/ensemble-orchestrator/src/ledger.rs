use crate::artifacts::{safe_segment, write_atomic};
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult, Task, TaskId, Verdict};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Last durable state of one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task: Task,
    /// Present once the task reached `Judged`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

impl TaskRecord {
    pub fn new(task: Task) -> Self {
        Self { task, verdict: None }
    }

    pub fn id(&self) -> &TaskId {
        &self.task.id
    }
}

/// Checkpoint storage for the task state machine.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert or replace the record for `record.task.id`.
    async fn save(&self, record: &TaskRecord) -> EnsembleResult<()>;
    async fn get(&self, id: &TaskId) -> EnsembleResult<Option<TaskRecord>>;
    async fn list(&self) -> EnsembleResult<Vec<TaskId>>;

    /// Records not yet `Approved` or `Failed`, oldest first.
    async fn list_unfinished(&self) -> EnsembleResult<Vec<TaskRecord>> {
        let mut records = Vec::new();
        for id in self.list().await? {
            if let Some(record) = self.get(&id).await? {
                if !record.task.is_terminal() {
                    records.push(record);
                }
            }
        }
        records.sort_by_key(|r| r.task.created_at);
        Ok(records)
    }
}

/// File-based task ledger (one JSON file per task).
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    pub async fn new(dir: PathBuf) -> EnsembleResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &TaskId) -> EnsembleResult<PathBuf> {
        let segment = safe_segment("task id", id.as_str())?;
        Ok(self.dir.join(format!("{segment}.json")))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn save(&self, record: &TaskRecord) -> EnsembleResult<()> {
        let path = self.record_path(record.id())?;
        let json = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &json).await
    }

    async fn get(&self, id: &TaskId) -> EnsembleResult<Option<TaskRecord>> {
        let path = self.record_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let record = serde_json::from_str(&data)
            .map_err(|e| EnsembleError::Store(format!("Failed to parse task record {id}: {e}")))?;
        Ok(Some(record))
    }

    async fn list(&self) -> EnsembleResult<Vec<TaskId>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    ids.push(TaskId::from(stem));
                }
            }
        }
        Ok(ids)
    }
}

/// In-memory ledger. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryTaskStore {
    records: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn save(&self, record: &TaskRecord) -> EnsembleResult<()> {
        self.records
            .write()
            .insert(record.id().clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> EnsembleResult<Option<TaskRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn list(&self) -> EnsembleResult<Vec<TaskId>> {
        Ok(self.records.read().keys().cloned().collect())
    }
}
