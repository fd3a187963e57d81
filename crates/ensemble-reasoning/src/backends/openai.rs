use super::{build_http, read_json, request_error, ReasoningBackend};
use crate::config::{ModelConfig, ReasoningProvider};
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, and any other provider that
/// implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(config: ModelConfig) -> EnsembleResult<Self> {
        let http = build_http(&config)?;
        Ok(Self { config, http })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, ReasoningProvider::OpenRouter) {
            request.header("X-Title", "Ensemble")
        } else {
            request
        }
    }
}

#[async_trait]
impl ReasoningBackend for OpenAiBackend {
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> EnsembleResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut messages = Vec::new();
        if let Some(sys) = system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": sys}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": messages,
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("OpenAI", &e))?;

        let resp_body = read_json("OpenAI", resp).await?;
        parse_openai_response(&resp_body)
    }
}

/// Extract the first choice's message content.
pub fn parse_openai_response(body: &serde_json::Value) -> EnsembleResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            EnsembleError::Reasoning("OpenAI response is missing `choices[0].message.content`".into())
        })
}
