use crate::message::ResultMessage;
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker result as recorded by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: TaskId,
    pub subtask_name: String,
    pub agent: String,
    pub output: serde_json::Value,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<ResultMessage> for TaskResult {
    fn from(msg: ResultMessage) -> Self {
        Self {
            task_id: msg.task_id,
            subtask_name: msg.subtask_name,
            agent: msg.agent,
            output: msg.output,
            success: msg.success,
            timestamp: msg.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// What the judge returns: `{report, bundle, score?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    pub report: String,
    pub bundle: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// The judge's aggregated outcome for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub task_id: TaskId,
    pub report: String,
    pub bundle: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Subtasks that never reported before the deadline. Empty on full collection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_subtasks: Vec<String>,
}

impl Verdict {
    pub fn new(task_id: TaskId, judgement: Judgement, missing_subtasks: Vec<String>) -> Self {
        Self {
            task_id,
            report: judgement.report,
            bundle: judgement.bundle,
            score: judgement.score,
            missing_subtasks,
        }
    }

    /// Whether the verdict was reached on partial data.
    pub fn is_partial(&self) -> bool {
        !self.missing_subtasks.is_empty()
    }

    /// The bundle as a JSON value, ready for an approval message.
    pub fn bundle_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.bundle.clone())
    }
}

/// A persisted report or bundle, keyed by `(task_id, filename)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRecord {
    pub task_id: TaskId,
    pub filename: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    pub fn new(task_id: TaskId, filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            task_id,
            filename: filename.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
