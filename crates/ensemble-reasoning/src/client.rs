use crate::backends::ollama::OllamaBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::ReasoningBackend;
use crate::config::{ModelConfig, ReasoningProvider};
use crate::failover::FailoverBackend;
use ensemble_core::EnsembleResult;

/// Reasoning client that dispatches to the correct provider backend.
///
/// When the config carries fallback models or a retry policy, the backends are
/// wrapped in a [`FailoverBackend`].
pub struct ReasoningClient {
    backend: Box<dyn ReasoningBackend>,
}

impl ReasoningClient {
    pub fn new(config: ModelConfig) -> EnsembleResult<Self> {
        let layered = config.retry_policy.is_some() || !config.fallback_models.is_empty();
        if !layered {
            return Ok(Self {
                backend: build_backend(config)?,
            });
        }

        let policy = config.retry_policy.clone().unwrap_or_default();
        let fallbacks = config.fallback_models.clone();
        let mut backends = vec![build_backend(config)?];
        for fallback in fallbacks {
            backends.push(build_backend(fallback)?);
        }
        Ok(Self {
            backend: Box::new(FailoverBackend::new(backends, policy)?),
        })
    }

    /// Create from a pre-built backend (for custom providers and tests).
    pub fn from_backend(backend: Box<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    /// Non-streaming completion.
    pub async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> EnsembleResult<String> {
        self.backend.complete(system_prompt, prompt).await
    }
}

fn build_backend(config: ModelConfig) -> EnsembleResult<Box<dyn ReasoningBackend>> {
    Ok(match config.provider {
        ReasoningProvider::Ollama => Box::new(OllamaBackend::new(config)?),
        ReasoningProvider::OpenAi | ReasoningProvider::OpenRouter | ReasoningProvider::Groq => {
            Box::new(OpenAiBackend::new(config)?)
        }
    })
}
