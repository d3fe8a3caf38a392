//! Request and response bodies of the assistant endpoints

use serde::{Deserialize, Serialize};

use super::completion::ChatTurn;

pub const DEFAULT_SLIDES: u32 = 5;
pub const MAX_SLIDES: u32 = 20;

/// Writing style; anything other than `"student"` is treated as formal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Student,
    #[default]
    #[serde(other)]
    Formal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub is_assignment_mode: bool,
    #[serde(default)]
    pub is_student_written: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlidesRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_slides")]
    pub slides_count: u32,
    #[serde(default)]
    pub include_speaker_notes: bool,
    #[serde(default)]
    pub tone: Tone,
}

fn default_slides() -> u32 {
    DEFAULT_SLIDES
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlidesResponse {
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiHighlight {
    #[serde(default)]
    pub sentence: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellingError {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarSuggestion {
    #[serde(default)]
    pub sentence: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Readability {
    #[serde(default)]
    pub flesch: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub ai_score: f64,
    #[serde(default)]
    pub ai_highlights: Vec<AiHighlight>,
    #[serde(default)]
    pub spelling_errors: Vec<SpellingError>,
    #[serde(default)]
    pub grammar_suggestions: Vec<GrammarSuggestion>,
    #[serde(default)]
    pub readability: Readability,
}
