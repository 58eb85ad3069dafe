//! OpenAI-compatible chat completions backend.
//!
//! Works against api.openai.com or any server exposing the same
//! `/chat/completions` route (vLLM, llama.cpp, Azure deployments).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use strata_models::{ChatMessage, ModelConfig};
use tracing::debug;

use crate::error::AgentError;
use crate::llm::{deadline_from_secs, LanguageModel};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    /// Whole-request timeout. `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            temperature: 0.0,
            timeout: Some(Duration::from_secs(120)),
        }
    }

    /// Build from the `[model]` section, reading the key from `api_key_env`.
    ///
    /// A missing or empty key is a configuration error.
    pub fn from_model_config(config: &ModelConfig) -> Result<Self, AgentError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AgentError::Config(format!(
                    "{} environment variable not set",
                    config.api_key_env
                ))
            })?;

        Ok(Self {
            api_key,
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: deadline_from_secs(config.timeout_seconds),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiModel {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiModel {
    pub fn new(config: OpenAiConfig) -> Result<Self, AgentError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        debug!(model = %self.config.model, messages = messages.len(), "Sending chat completion");

        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(AgentError::Http(format!(
                "chat completion failed ({}): {}",
                status.as_u16(),
                err_body
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AgentError::Model("model returned empty response".to_string()));
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> OpenAiModel {
        let config = OpenAiConfig::new("sk-test", "gpt-4o-mini").with_api_base(server.uri());
        OpenAiModel::new(config).unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "system", "content": "persona"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Buy the dip."}}]
            })))
            .mount(&server)
            .await;

        let model = model_for(&server);
        let text = model
            .complete(&[ChatMessage::system("persona"), ChatMessage::user("q")])
            .await
            .unwrap();
        assert_eq!(text, "Buy the dip.");
    }

    #[tokio::test]
    async fn non_success_status_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = model_for(&server)
            .complete(&[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Http(ref msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn empty_choices_is_model_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = model_for(&server)
            .complete(&[ChatMessage::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
    }

    #[test]
    fn missing_key_is_config_error() {
        let config = ModelConfig {
            api_key_env: "STRATA_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..ModelConfig::default()
        };
        let err = OpenAiConfig::from_model_config(&config).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[tokio::test]
    async fn zero_timeout_means_no_deadline() {
        std::env::set_var("STRATA_TEST_OPENAI_ZERO_TIMEOUT_KEY", "sk-test");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hold."}}]
            })))
            .mount(&server)
            .await;

        let config = OpenAiConfig::from_model_config(&ModelConfig {
            api_key_env: "STRATA_TEST_OPENAI_ZERO_TIMEOUT_KEY".to_string(),
            timeout_seconds: 0,
            ..ModelConfig::default()
        })
        .unwrap()
        .with_api_base(server.uri());
        assert_eq!(config.timeout, None);

        let text = OpenAiModel::new(config)
            .unwrap()
            .complete(&[ChatMessage::user("q")])
            .await
            .unwrap();
        assert_eq!(text, "Hold.");
    }
}
