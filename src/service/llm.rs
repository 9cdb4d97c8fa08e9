//! Shared LLM client and interaction utilities
//!
//! Provides a common interface for Gemini API interactions used by the triage service.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;

/// Environment variable for the triage model
const ENV_TRIAGE_MODEL: &str = "TRIAGE_MODEL";

/// Default model for incident triage
const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Error type for LLM interactions
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    #[error("LLM completion failed: {0}")]
    Completion(String),
}

/// Something that turns a prompt into raw model text
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model identifier recorded with each analysis
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: gemini::Client,
    model: String,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    ///
    /// Uses the TRIAGE_MODEL env var when set (defaults to gemini-2.5-pro).
    pub fn new(api_key: &str) -> Self {
        let model = std::env::var(ENV_TRIAGE_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::with_model(api_key, model)
    }

    pub fn with_model(api_key: &str, model: impl Into<String>) -> Self {
        let model = model.into();
        let client = gemini::Client::new(api_key);

        tracing::info!(model = %model, "Gemini client initialized");

        Self { client, model }
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let start_time = std::time::Instant::now();

        tracing::debug!(
            model = %self.model,
            prompt_length = prompt.len(),
            "Initiating Gemini API call for incident triage"
        );

        // The system prompt is already part of the composed prompt
        let agent = self
            .client
            .agent(&self.model)
            .additional_params(serde_json::json!({
                "generationConfig": { "responseMimeType": "application/json" }
            }))
            .build();

        match agent.prompt(prompt).await {
            Ok(response) => {
                tracing::info!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt.len(),
                    response_length = response.len(),
                    "Gemini API call for incident triage completed successfully"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt.len(),
                    error = %e,
                    "Gemini API call for incident triage failed"
                );
                Err(LlmError::Completion(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_reports_configured_model() {
        let client = LlmClient::with_model("test-key", "gemini-2.5-flash");
        assert_eq!(client.model(), "gemini-2.5-flash");
    }
}
