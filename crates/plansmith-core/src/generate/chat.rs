//! Azure OpenAI chat-completions adapter for [`TextGenerator`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerateError, TextGenerator};

const SYSTEM_MESSAGE: &str =
    "You are a meticulous project planner. You answer with JSON only.";

/// Settings for a chat-completions deployment.
#[derive(Clone)]
pub struct ChatConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl ChatConfig {
    pub const DEFAULT_API_VERSION: &str = "2024-02-01";

    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            temperature: 0.2,
            max_tokens: 1200,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generator that sends the prompt as a single user message.
#[derive(Debug, Clone)]
pub struct ChatCompletionsGenerator {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(config: ChatConfig) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GenerateError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let request = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!(deployment = %self.config.deployment, "requesting plan completion");
        let response = self
            .http
            .post(self.config.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerateError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerateError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerateError::Transport(format!("unexpected completion shape: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerateError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_layout() {
        let cfg = ChatConfig::new("https://res.openai.azure.com/", "key", "gpt4");
        assert_eq!(
            cfg.completions_url(),
            "https://res.openai.azure.com/openai/deployments/gpt4/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = ChatConfig::new("https://res", "sk-very-secret", "d");
        assert!(!format!("{cfg:?}").contains("sk-very-secret"));
    }
}
