//! Study assistant: chat, slide outlines and writing analysis
//!
//! Requests are validated and turned into prompts here; generation itself is
//! delegated to a [`CompletionService`].

pub mod completion;
pub mod gemini;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod prompts;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

pub use completion::{ChatTurn, CompletionError, CompletionService};
use models::{
    Analysis, AnalyzeRequest, ChatRequest, ChatResponse, SlidesRequest, SlidesResponse,
    MAX_SLIDES,
};

/// Shortest text (after trimming) the analyzer accepts, in characters
pub const MIN_ANALYSIS_CHARS: usize = 50;
const MAX_HIGHLIGHTS: usize = 3;
const MAX_GRAMMAR_SUGGESTIONS: usize = 3;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Model response did not match the expected shape: {0}")]
    UnexpectedShape(String),
}

#[derive(Clone)]
pub struct Assistant {
    service: Arc<dyn CompletionService>,
}

impl Assistant {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service }
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AssistantError> {
        if request.message.trim().is_empty() {
            return Err(AssistantError::InvalidRequest("Message is required.".to_string()));
        }

        let instruction = prompts::chat_instruction(
            request.tone,
            request.is_assignment_mode,
            request.is_student_written,
        );
        let mut history = request.history;
        history.push(ChatTurn::user(request.message));
        debug!("Chat with {} turn(s) of history", history.len() - 1);

        let text = self.service.complete(&instruction, &history).await?;
        Ok(ChatResponse { text })
    }

    pub async fn generate_slides(
        &self,
        request: SlidesRequest,
    ) -> Result<SlidesResponse, AssistantError> {
        if request.topic.trim().is_empty() {
            return Err(AssistantError::InvalidRequest("Topic is required.".to_string()));
        }
        if !(1..=MAX_SLIDES).contains(&request.slides_count) {
            return Err(AssistantError::InvalidRequest(format!(
                "Number of slides must be between 1 and {}.",
                MAX_SLIDES
            )));
        }

        let prompt = prompts::slides_prompt(&request);
        let value = self
            .service
            .generate_json(&prompt, &prompts::slides_schema())
            .await?;
        let mut response: SlidesResponse = serde_json::from_value(value)
            .map_err(|e| AssistantError::UnexpectedShape(e.to_string()))?;

        if !request.include_speaker_notes {
            for slide in &mut response.slides {
                slide.speaker_notes = None;
            }
        }
        info!(
            "Generated {} slide(s) for '{}'",
            response.slides.len(),
            request.topic.trim()
        );
        Ok(response)
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<Analysis, AssistantError> {
        let text = request.text.trim();
        if text.chars().count() < MIN_ANALYSIS_CHARS {
            return Err(AssistantError::InvalidRequest(format!(
                "Please provide at least {} characters of text to analyze.",
                MIN_ANALYSIS_CHARS
            )));
        }

        let value = self
            .service
            .generate_json(&prompts::analysis_prompt(&request.text), &prompts::analysis_schema())
            .await?;
        let analysis: Analysis = serde_json::from_value(value)
            .map_err(|e| AssistantError::UnexpectedShape(e.to_string()))?;

        Ok(normalize_analysis(analysis))
    }
}

fn normalize_analysis(mut analysis: Analysis) -> Analysis {
    analysis.ai_score = if analysis.ai_score.is_finite() {
        analysis.ai_score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    analysis.ai_highlights.truncate(MAX_HIGHLIGHTS);
    analysis.grammar_suggestions.truncate(MAX_GRAMMAR_SUGGESTIONS);
    analysis
}
