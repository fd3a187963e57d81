use crate::response::extract_json;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult, Judgement, Task, TaskResult};
use ensemble_reasoning::ReasoningClient;
use std::sync::Arc;
use tracing::debug;

const JUDGE_SYSTEM_PROMPT: &str = "You review the results that worker agents produced for a \
task. Some subtasks may be listed as missing because they never reported. Answer with a JSON \
object only: a string `report`, an object `bundle`, and an optional numeric `score`.";

/// Aggregates collected results into a report and approval bundle.
#[async_trait]
pub trait Judge: Send + Sync {
    /// `missing` is empty on full collection; otherwise the verdict is partial.
    async fn judge(
        &self,
        task: &Task,
        results: &[TaskResult],
        missing: &[String],
    ) -> EnsembleResult<Judgement>;
}

/// [`Judge`] backed by the external reasoning capability.
pub struct ReasoningJudge {
    client: Arc<ReasoningClient>,
}

impl ReasoningJudge {
    pub fn new(client: Arc<ReasoningClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Judge for ReasoningJudge {
    async fn judge(
        &self,
        task: &Task,
        results: &[TaskResult],
        missing: &[String],
    ) -> EnsembleResult<Judgement> {
        let mut request = serde_json::json!({
            "task": {"id": task.id, "payload": task.payload},
            "results": results,
        });
        if !missing.is_empty() {
            request["missingSubtasks"] = serde_json::json!(missing);
        }
        let raw = self
            .client
            .complete(Some(JUDGE_SYSTEM_PROMPT), &request.to_string())
            .await?;
        debug!(task_id = %task.id, bytes = raw.len(), "Judge response received");
        parse_judgement(&raw)
    }
}

/// Validate a judge response against `{report: string, bundle: object, score?: number}`.
pub fn parse_judgement(raw: &str) -> EnsembleResult<Judgement> {
    let value: serde_json::Value = serde_json::from_str(extract_json(raw))
        .map_err(|e| EnsembleError::schema("judgement", e))?;
    let obj = value
        .as_object()
        .ok_or_else(|| EnsembleError::schema("judgement", "response must be a JSON object"))?;

    let report = obj
        .get("report")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| EnsembleError::schema("judgement", "`report` must be a string"))?;

    let bundle = obj
        .get("bundle")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| EnsembleError::schema("judgement", "`bundle` must be an object"))?;

    let score = match obj.get("score") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_f64()
                .filter(|s| s.is_finite())
                .ok_or_else(|| EnsembleError::schema("judgement", "`score` must be a number"))?,
        ),
    };

    Ok(Judgement {
        report: report.to_string(),
        bundle: bundle.clone(),
        score,
    })
}
