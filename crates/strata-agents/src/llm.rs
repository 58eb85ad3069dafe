use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use strata_models::{ChatMessage, Role};

use crate::error::AgentError;

/// Anything that turns role-tagged messages into generated text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AgentError>;
}

/// Convert a configured number of seconds into an optional deadline (0 = none).
pub fn deadline_from_secs(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

/// Run `call` under an optional deadline; an elapsed deadline is an ordinary error.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, call: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AgentError::Timeout(limit))?,
        None => call.await,
    }
}

/// Split messages into a single system prompt and a single user prompt.
pub(crate) fn split_prompts(messages: &[ChatMessage]) -> (String, String) {
    let mut system = Vec::new();
    let mut user = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content.as_str()),
            Role::User => user.push(message.content.as_str()),
        }
    }
    (system.join("\n\n"), user.join("\n\n"))
}
