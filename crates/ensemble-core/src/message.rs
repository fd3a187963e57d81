//! Wire schemas for every message that crosses a queue boundary.
//!
//! Each kind implements [`WireMessage`]: decoding goes through serde and then
//! [`WireMessage::validate`], and any mismatch surfaces as
//! [`EnsembleError::Schema`] naming the message kind.

use crate::error::{EnsembleError, EnsembleResult};
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A message kind with a fixed JSON shape.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Tag used in schema errors and logs.
    const KIND: &'static str;

    /// Boundary checks serde cannot express.
    fn validate(&self) -> EnsembleResult<()> {
        Ok(())
    }

    /// Parse and validate a raw queue payload.
    fn decode(raw: &str) -> EnsembleResult<Self> {
        let msg: Self =
            serde_json::from_str(raw).map_err(|e| EnsembleError::schema(Self::KIND, e))?;
        msg.validate()?;
        Ok(msg)
    }

    /// Validate and serialize for a queue push.
    fn encode(&self) -> EnsembleResult<String> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }
}

fn require_non_empty(kind: &str, field: &str, value: &str) -> EnsembleResult<()> {
    if value.trim().is_empty() {
        return Err(EnsembleError::schema(kind, format!("`{field}` must not be empty")));
    }
    Ok(())
}

/// `{id, payload}`: a task submitted to the incoming queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingTask {
    pub id: TaskId,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WireMessage for IncomingTask {
    const KIND: &'static str = "incoming";

    fn validate(&self) -> EnsembleResult<()> {
        require_non_empty(Self::KIND, "id", self.id.as_str())
    }
}

/// `{taskId, subtaskName, agent, params}`: one subtask for an agent queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchMessage {
    pub task_id: TaskId,
    pub subtask_name: String,
    pub agent: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Identifies one dispatch run of the task. Workers echo it back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<String>,
}

impl WireMessage for DispatchMessage {
    const KIND: &'static str = "dispatch";

    fn validate(&self) -> EnsembleResult<()> {
        require_non_empty(Self::KIND, "taskId", self.task_id.as_str())?;
        require_non_empty(Self::KIND, "subtaskName", &self.subtask_name)?;
        require_non_empty(Self::KIND, "agent", &self.agent)
    }
}

/// `{taskId, subtaskName, agent, output, success}`: posted by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMessage {
    pub task_id: TaskId,
    pub subtask_name: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub output: serde_json::Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// The dispatch run this result answers, if the worker echoed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<String>,
}

impl ResultMessage {
    /// A successful result stamped with the current time.
    pub fn success(dispatch: &DispatchMessage, output: serde_json::Value) -> Self {
        Self::from_dispatch(dispatch, output, true)
    }

    /// An explicit failure result; workers must post one instead of staying silent.
    pub fn failure(dispatch: &DispatchMessage, error: impl Into<String>) -> Self {
        Self::from_dispatch(dispatch, serde_json::Value::String(error.into()), false)
    }

    fn from_dispatch(dispatch: &DispatchMessage, output: serde_json::Value, success: bool) -> Self {
        Self {
            task_id: dispatch.task_id.clone(),
            subtask_name: dispatch.subtask_name.clone(),
            agent: dispatch.agent.clone(),
            output,
            success,
            timestamp: Some(Utc::now()),
            attempt: dispatch.attempt.clone(),
        }
    }
}

impl WireMessage for ResultMessage {
    const KIND: &'static str = "result";

    fn validate(&self) -> EnsembleResult<()> {
        require_non_empty(Self::KIND, "taskId", self.task_id.as_str())?;
        require_non_empty(Self::KIND, "subtaskName", &self.subtask_name)
    }
}

/// `{id, bundle}`: a finalized verdict bundle for the approval stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalMessage {
    pub id: TaskId,
    pub bundle: serde_json::Value,
}

impl WireMessage for ApprovalMessage {
    const KIND: &'static str = "approval";

    fn validate(&self) -> EnsembleResult<()> {
        require_non_empty(Self::KIND, "id", self.id.as_str())?;
        if !self.bundle.is_object() {
            return Err(EnsembleError::schema(Self::KIND, "`bundle` must be an object"));
        }
        Ok(())
    }
}
