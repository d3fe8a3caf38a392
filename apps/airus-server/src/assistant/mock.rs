//! Scripted completion service for tests
//!
//! Replies are consumed in order; every call is recorded so tests can check
//! the instruction and prompt that were sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::completion::{ChatTurn, CompletionError, CompletionService};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Complete {
        system_instruction: String,
        history: Vec<ChatTurn>,
    },
    GenerateJson {
        prompt: String,
        schema: Value,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MockCompletionService {
    replies: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockCompletionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply (parsed as JSON for `generate_json`).
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
        self
    }

    pub fn with_json_reply(self, value: Value) -> Self {
        self.with_reply(value.to_string())
    }

    pub fn with_error(self, error: CompletionError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<String, CompletionError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CompletionError::EmptyResponse))
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(
        &self,
        system_instruction: &str,
        history: &[ChatTurn],
    ) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(RecordedCall::Complete {
            system_instruction: system_instruction.to_string(),
            history: history.to_vec(),
        });
        self.next_reply()
    }

    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, CompletionError> {
        self.calls.lock().unwrap().push(RecordedCall::GenerateJson {
            prompt: prompt.to_string(),
            schema: schema.clone(),
        });
        let text = self.next_reply()?;
        serde_json::from_str(&text).map_err(|e| CompletionError::MalformedJson(e.to_string()))
    }
}
