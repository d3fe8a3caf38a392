//! Completion service port
//!
//! The assistant only needs two primitives from a generative model: a
//! conversational reply and a JSON document constrained by a schema.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One turn of a conversation in the wire shape the frontend already uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(default)]
    pub parts: Vec<ChatPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPart {
    #[serde(default)]
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![ChatPart { text: text.into() }],
        }
    }
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Model returned malformed JSON: {0}")]
    MalformedJson(String),
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Reply to the last turn of `history` under `system_instruction`.
    async fn complete(
        &self,
        system_instruction: &str,
        history: &[ChatTurn],
    ) -> Result<String, CompletionError>;

    /// Generate a JSON document for `prompt` that conforms to `schema`.
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, CompletionError>;
}
