pub mod ollama;
pub mod openai;

use crate::config::ModelConfig;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use std::time::Duration;

/// Trait for reasoning provider backends.
///
/// A backend turns one prompt into one textual completion. It knows nothing
/// about plans or verdicts; schema enforcement happens in the caller.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `ReasoningBackend` for your struct
/// 3. Add the variant to `ReasoningProvider` in `config.rs`
/// 4. Wire it up in `ReasoningClient::new()` in `client.rs`
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// Non-streaming completion.
    async fn complete(&self, system_prompt: Option<&str>, prompt: &str) -> EnsembleResult<String>;
}

pub(crate) fn build_http(config: &ModelConfig) -> EnsembleResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| EnsembleError::Config(format!("HTTP client: {e}")))
}

/// Longest slice of an error body kept in the error message.
const ERROR_BODY_LIMIT: usize = 512;

/// Read a JSON response body. A non-2xx status is an error that always names
/// the status, whatever the body looks like.
pub(crate) async fn read_json(
    provider: &str,
    resp: reqwest::Response,
) -> EnsembleResult<serde_json::Value> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let snippet: String = text.trim().chars().take(ERROR_BODY_LIMIT).collect();
        return Err(EnsembleError::Reasoning(format!(
            "{provider} API error {status}: {snippet}"
        )));
    }
    resp.json().await.map_err(|e| request_error(provider, &e))
}

pub(crate) fn request_error(provider: &str, err: &reqwest::Error) -> EnsembleError {
    if err.is_timeout() {
        EnsembleError::Reasoning(format!("{provider} request timeout: {err}"))
    } else if err.is_connect() {
        EnsembleError::Reasoning(format!("{provider} connect failed: {err}"))
    } else {
        EnsembleError::Reasoning(format!("{provider} request failed: {err}"))
    }
}
