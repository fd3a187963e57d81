use crate::error::{EnsembleError, EnsembleResult, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a task, taken verbatim from the incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap a raw id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a task.
///
/// Moves forward one step at a time. Any non-terminal status may move to
/// `Failed`. `Approved` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Planned,
    Dispatched,
    Collecting,
    Judged,
    Approved,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Planned => 1,
            TaskStatus::Dispatched => 2,
            TaskStatus::Collecting => 3,
            TaskStatus::Judged => 4,
            TaskStatus::Approved => 5,
            TaskStatus::Failed => u8::MAX,
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == TaskStatus::Failed {
            return true;
        }
        next.rank() == self.rank() + 1
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Planned => "planned",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Collecting => "collecting",
            TaskStatus::Judged => "judged",
            TaskStatus::Approved => "approved",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status of a single subtask as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    /// Enqueued on its agent's queue.
    Queued,
    /// The owning task is collecting; a worker may be executing it.
    Running,
    /// A `success: true` result arrived.
    Completed,
    /// A `success: false` result arrived.
    Failed,
    /// No result before the collection deadline.
    TimedOut,
}

/// One planner-produced step: which agent runs it, under which name, with what params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedSubtask {
    pub agent: String,
    pub name: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

impl PlannedSubtask {
    pub fn new(agent: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            name: name.into(),
            params: empty_params(),
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// A subtask owned by exactly one [`Task`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub task_id: TaskId,
    pub agent: String,
    pub name: String,
    pub params: serde_json::Value,
    pub status: SubtaskStatus,
}

/// Why a task ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// A unit of work submitted for multi-agent processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub payload: serde_json::Value,
    pub status: TaskStatus,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Id of the current dispatch run; results from other runs are stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<String>,
}

impl Task {
    /// Create a `Pending` task.
    pub fn new(id: impl Into<TaskId>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            payload,
            status: TaskStatus::Pending,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
            failure: None,
            attempt: None,
        }
    }

    /// Move to `next`, rejecting backwards moves and moves out of a terminal state.
    pub fn advance(&mut self, next: TaskStatus) -> EnsembleResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EnsembleError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Failed`, recording the error kind and message.
    pub fn fail(&mut self, err: &EnsembleError) -> EnsembleResult<()> {
        self.advance(TaskStatus::Failed)?;
        self.failure = Some(Failure {
            kind: err.kind(),
            reason: err.to_string(),
            at: self.updated_at,
        });
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Replace the subtask list with the given plan. Every subtask starts `Queued`.
    pub fn attach_plan(&mut self, plan: &[PlannedSubtask]) {
        self.subtasks = plan
            .iter()
            .map(|p| Subtask {
                task_id: self.id.clone(),
                agent: p.agent.clone(),
                name: p.name.clone(),
                params: p.params.clone(),
                status: SubtaskStatus::Queued,
            })
            .collect();
    }

    /// Start a new dispatch run and return its id.
    pub fn begin_attempt(&mut self) -> &str {
        self.attempt
            .insert(uuid::Uuid::new_v4().to_string())
            .as_str()
    }

    /// Names of all subtasks; the identity set the collector expects.
    pub fn subtask_names(&self) -> BTreeSet<String> {
        self.subtasks.iter().map(|s| s.name.clone()).collect()
    }

    pub fn set_all_subtasks(&mut self, status: SubtaskStatus) {
        for subtask in &mut self.subtasks {
            subtask.status = status;
        }
    }

    /// Update one subtask by name. Returns false if no such subtask exists.
    pub fn set_subtask_status(&mut self, name: &str, status: SubtaskStatus) -> bool {
        match self.subtasks.iter_mut().find(|s| s.name == name) {
            Some(subtask) => {
                subtask.status = status;
                true
            }
            None => false,
        }
    }
}
