//! Hosted chat-completion client
//!
//! Speaks the OpenAI-compatible `POST {base_url}/chat/completions` endpoint:
//! one system turn, one user turn, a single non-streamed completion.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::errors::{QnaError, Result};

/// Default chat-completions endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Anything that can turn a system prompt and a user message into a reply
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier reported in responses
    fn model_name(&self) -> &str;

    /// Produce one completion
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Chat client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat client
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    api_key: String,
    config: ChatClientConfig,
}

impl ChatClient {
    /// Create a client with an explicit API key
    pub fn new(api_key: impl Into<String>, config: ChatClientConfig) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(QnaError::MissingApiKey("empty API key".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(QnaError::HttpError)?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Create a client reading the API key from the environment variable `key_var`
    pub fn from_env(key_var: &str, config: ChatClientConfig) -> Result<Self> {
        let api_key = std::env::var(key_var)
            .map_err(|_| QnaError::MissingApiKey(format!("{} is not set", key_var)))?;
        Self::new(api_key, config)
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %self.config.model, "sending chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| QnaError::ChatApi(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(QnaError::ChatApi(format!("HTTP {}: {}", status, error_text)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| QnaError::ChatApi(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| QnaError::ChatApi("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rejects_blank_key() {
        let result = ChatClient::new("  ", ChatClientConfig::default());
        assert!(matches!(result, Err(QnaError::MissingApiKey(_))));
    }

    #[test]
    fn test_from_env_missing_variable() {
        let result = ChatClient::from_env(
            "MUSICQNA_TEST_KEY_THAT_IS_NEVER_SET",
            ChatClientConfig::default(),
        );
        assert!(matches!(result, Err(QnaError::MissingApiKey(_))));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = ChatClientConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let client = ChatClient::new("sk-test", config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model_name(), DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "질문: 토닉",
            }],
            max_tokens: 1000,
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 1000);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" 답변 "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some(" 답변 "));

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.choices.is_empty());
    }

    #[tokio::test]
    #[ignore] // Integration test - requires network and OPENAI_API_KEY
    async fn test_live_completion() {
        let client = ChatClient::from_env("OPENAI_API_KEY", ChatClientConfig::default()).unwrap();
        let reply = client.complete("Answer briefly.", "Say hi").await.unwrap();
        assert!(!reply.is_empty());
    }
}
