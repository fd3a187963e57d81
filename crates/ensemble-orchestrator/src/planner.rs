use crate::response::extract_json;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult, PlannedSubtask, Task};
use ensemble_reasoning::ReasoningClient;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

const PLAN_SYSTEM_PROMPT: &str = "You split a task into subtasks for specialised worker agents. \
Answer with a JSON array only. Each element is an object with a string `agent`, a unique \
string `name`, and an optional object `params`.";

/// Breaks a task into an ordered list of agent-specific subtasks.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Produce the plan, or a schema error if the response is malformed.
    async fn plan(&self, task: &Task) -> EnsembleResult<Vec<PlannedSubtask>>;
}

/// [`Planner`] backed by the external reasoning capability.
pub struct ReasoningPlanner {
    client: Arc<ReasoningClient>,
}

impl ReasoningPlanner {
    pub fn new(client: Arc<ReasoningClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Planner for ReasoningPlanner {
    async fn plan(&self, task: &Task) -> EnsembleResult<Vec<PlannedSubtask>> {
        let request = serde_json::json!({
            "task": {"id": task.id, "payload": task.payload},
        });
        let raw = self
            .client
            .complete(Some(PLAN_SYSTEM_PROMPT), &request.to_string())
            .await?;
        debug!(task_id = %task.id, bytes = raw.len(), "Planner response received");
        parse_plan(&raw)
    }
}

fn valid_agent_name(agent: &str) -> bool {
    !agent.is_empty() && !agent.contains(':') && !agent.chars().any(char::is_whitespace)
}

/// Validate a planner response against `[{agent, name, params?}]`.
pub fn parse_plan(raw: &str) -> EnsembleResult<Vec<PlannedSubtask>> {
    let value: serde_json::Value =
        serde_json::from_str(extract_json(raw)).map_err(|e| EnsembleError::schema("plan", e))?;
    let steps = value
        .as_array()
        .ok_or_else(|| EnsembleError::schema("plan", "response must be a JSON array"))?;

    let mut seen = HashSet::new();
    let mut plan = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let obj = step
            .as_object()
            .ok_or_else(|| EnsembleError::schema("plan", format!("step {i} is not an object")))?;

        let agent = obj
            .get("agent")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|a| valid_agent_name(a))
            .ok_or_else(|| {
                EnsembleError::schema("plan", format!("step {i}: `agent` must be a queue-safe name"))
            })?;

        let name = obj
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                EnsembleError::schema("plan", format!("step {i}: `name` must be a non-empty string"))
            })?;

        if !seen.insert(name.to_string()) {
            return Err(EnsembleError::schema(
                "plan",
                format!("duplicate subtask name `{name}`"),
            ));
        }

        let subtask = PlannedSubtask::new(agent, name);
        let subtask = match obj.get("params") {
            None | Some(serde_json::Value::Null) => subtask,
            Some(params) if params.is_object() => subtask.with_params(params.clone()),
            Some(_) => {
                return Err(EnsembleError::schema(
                    "plan",
                    format!("step {i}: `params` must be an object"),
                ))
            }
        };
        plan.push(subtask);
    }
    Ok(plan)
}
