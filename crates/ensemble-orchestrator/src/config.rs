use ensemble_bus::QueueNames;
use ensemble_core::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the orchestrator loop and its per-task pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub queues: QueueNames,
    /// How long the collector waits for worker results before judging on partial data.
    #[serde(default = "default_collect_deadline_ms")]
    pub collect_deadline_ms: u64,
    /// Upper bound on in-flight tasks. `1` processes tasks strictly one at a time.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_report_filename")]
    pub report_filename: String,
    #[serde(default = "default_bundle_filename")]
    pub bundle_filename: String,
    /// Retries for artifact persistence and the approval hand-off.
    #[serde(default = "default_persist_retry")]
    pub persist_retry: RetryPolicy,
    /// Backoff for queue connection errors in the ingestion loop and collector.
    #[serde(default = "default_connection_retry")]
    pub connection_retry: RetryPolicy,
}

fn default_collect_deadline_ms() -> u64 {
    600_000
}

fn default_max_concurrent_tasks() -> usize {
    16
}

fn default_report_filename() -> String {
    "report.md".to_string()
}

fn default_bundle_filename() -> String {
    "bundle.json".to_string()
}

fn default_persist_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 5,
        backoff_base_ms: 200,
        backoff_max_ms: 10_000,
    }
}

fn default_connection_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: u32::MAX,
        backoff_base_ms: 250,
        backoff_max_ms: 30_000,
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queues: QueueNames::default(),
            collect_deadline_ms: default_collect_deadline_ms(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            report_filename: default_report_filename(),
            bundle_filename: default_bundle_filename(),
            persist_retry: default_persist_retry(),
            connection_retry: default_connection_retry(),
        }
    }
}

impl OrchestratorConfig {
    pub fn collect_deadline(&self) -> Duration {
        Duration::from_millis(self.collect_deadline_ms)
    }

    pub fn with_collect_deadline(mut self, deadline: Duration) -> Self {
        self.collect_deadline_ms = deadline.as_millis() as u64;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.collect_deadline(), Duration::from_secs(600));
        assert_eq!(config.max_concurrent_tasks, 16);
        assert_eq!(config.report_filename, "report.md");
        assert_eq!(config.queues.incoming, "tasks:incoming");
    }

    #[test]
    fn test_toml_section() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            collect_deadline_ms = 5000
            max_concurrent_tasks = 1

            [queues]
            approval = "review:pending"

            [persist_retry]
            max_retries = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.collect_deadline(), Duration::from_millis(5000));
        assert_eq!(config.max_concurrent_tasks, 1);
        assert_eq!(config.queues.approval, "review:pending");
        assert_eq!(config.queues.incoming, "tasks:incoming");
        assert_eq!(config.persist_retry.max_retries, 2);
        assert_eq!(config.persist_retry.backoff_base_ms, 500);
        assert_eq!(config.bundle_filename, "bundle.json");
    }
}
