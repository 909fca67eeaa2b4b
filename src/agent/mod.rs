//! LLM agent modules for report analysis.
//!
//! This module provides the model client and the policy-bound analysis engine.

pub mod analysis;
pub mod client;

pub use analysis::AnalysisEngine;
pub use client::{ClientConfig, ModelClient, OllamaClient};

#[cfg(test)]
pub mod testing {
    //! Deterministic model doubles for tests.

    use super::client::{ChatMessage, ClientError, ModelClient};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Replays a fixed reply (or a fixed error) and records what was sent.
    pub struct ScriptedModel {
        reply: Option<String>,
        sent: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
        }

        pub fn last_messages(&self) -> Vec<ChatMessage> {
            self.sent.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClientError> {
            self.sent.lock().unwrap().push(messages.to_vec());
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => Err(ClientError::Api {
                    status: 503,
                    body: "model unavailable".to_string(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }
}
