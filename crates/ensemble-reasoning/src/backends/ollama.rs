use super::{build_http, read_json, request_error, ReasoningBackend};
use crate::config::ModelConfig;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};

/// Ollama `/api/chat` backend, non-streaming, JSON output mode.
pub struct OllamaBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: ModelConfig) -> EnsembleResult<Self> {
        let http = build_http(&config)?;
        Ok(Self { config, http })
    }

    fn build_body(&self, system_prompt: Option<&str>, prompt: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(sys) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        serde_json::json!({
            "model": self.config.model_id,
            "messages": messages,
            "stream": false,
            "format": "json",
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        })
    }
}

#[async_trait]
impl ReasoningBackend for OllamaBackend {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> EnsembleResult<String> {
        let url = format!("{}/api/chat", self.config.base_url());
        let body = self.build_body(system_prompt, prompt);

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("Ollama", &e))?;

        let resp_body = read_json("Ollama", resp).await?;
        parse_ollama_response(&resp_body)
    }
}

/// Extract `message.content` from an `/api/chat` response.
pub fn parse_ollama_response(body: &serde_json::Value) -> EnsembleResult<String> {
    body["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            EnsembleError::Reasoning("Ollama response is missing `message.content`".into())
        })
}
