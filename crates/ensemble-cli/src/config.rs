use anyhow::Context;
use ensemble_orchestrator::OrchestratorConfig;
use ensemble_reasoning::ModelConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            model: ModelConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl EnsembleConfig {
    /// Read `path`, falling back to defaults if it does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Apply `REDIS_URL`, `OLLAMA_BASE` and `OLLAMA_MODEL` on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("REDIS_URL") {
            self.bus.redis_url = url;
        }
        if let Some(base) = lookup("OLLAMA_BASE") {
            self.model.api_base_url = Some(base);
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.model.model_id = model;
        }
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.data_dir.join("tasks")
    }
}
