//! Chat model client.
//!
//! The analysis engine talks to the model through the [`ModelClient`]
//! trait; [`OllamaClient`] is the production implementation backed by the
//! Ollama chat API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration for the model client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.0,
            timeout_seconds: 120,
        }
    }
}

/// Errors raised while talking to the model.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to Ollama at {0}. Is Ollama running?")]
    Connect(String),

    #[error("Failed to send request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ollama API error {status}: {body}")]
    Api { status: u16, body: String },
}

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A prompt-in, text-out chat model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the messages and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClientError>;

    /// Name of the model, for logging.
    fn model_name(&self) -> &str;
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Model client backed by a local or remote Ollama server.
pub struct OllamaClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClientError> {
        let url = self.chat_url();

        let request = OllamaChatRequest {
            model: &self.config.model_name,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending chat request with {} messages to {}", messages.len(), url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    ClientError::Connect(self.config.ollama_url.clone())
                } else {
                    ClientError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response.json().await?;

        Ok(chat_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.model_name, "llama3.2:latest");
        assert_eq!(config.temperature, 0.0);
    }

    #[test]
    fn test_chat_url_trims_trailing_slash() {
        let client = OllamaClient::new(ClientConfig {
            ollama_url: "http://localhost:11434/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(client.model_name(), "llama3.2:latest");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let request = OllamaChatRequest {
            model: "m",
            messages: &messages,
            stream: false,
            options: OllamaOptions { temperature: 0.0 },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let client = OllamaClient::new(ClientConfig {
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..ClientConfig::default()
        })
        .unwrap();

        let result = client.complete(&[ChatMessage::user("hi")]).await;
        assert!(result.is_err());
    }
}
