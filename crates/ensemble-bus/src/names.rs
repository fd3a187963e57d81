use ensemble_core::TaskId;
use serde::{Deserialize, Serialize};

/// Queue naming convention shared by the orchestrator and its workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNames {
    /// Where new tasks arrive.
    #[serde(default = "default_incoming")]
    pub incoming: String,
    /// Where finalized bundles go.
    #[serde(default = "default_approval")]
    pub approval: String,
    /// Prefix of each agent's subtask queue (`<prefix><agent>`).
    #[serde(default = "default_agent_prefix")]
    pub agent_prefix: String,
    /// Prefix of each task's result queue (`<prefix><task_id>`).
    #[serde(default = "default_result_prefix")]
    pub result_prefix: String,
}

fn default_incoming() -> String {
    "tasks:incoming".to_string()
}

fn default_approval() -> String {
    "tasks:approval".to_string()
}

fn default_agent_prefix() -> String {
    "queue:".to_string()
}

fn default_result_prefix() -> String {
    "artifacts:".to_string()
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            incoming: default_incoming(),
            approval: default_approval(),
            agent_prefix: default_agent_prefix(),
            result_prefix: default_result_prefix(),
        }
    }
}

impl QueueNames {
    /// Queue consumed by the workers of `agent`.
    pub fn agent_queue(&self, agent: &str) -> String {
        format!("{}{agent}", self.agent_prefix)
    }

    /// Queue the workers post `task_id`'s results to.
    pub fn result_queue(&self, task_id: &TaskId) -> String {
        format!("{}{task_id}", self.result_prefix)
    }
}
