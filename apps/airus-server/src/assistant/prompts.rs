//! Prompt and schema assembly for the assistant

use serde_json::{json, Value};

use super::models::{SlidesRequest, Tone};

const PERSONA: &str = "You are AiRus, a friendly and helpful AI assistant for students.";

const STUDENT_WRITTEN_ASSIGNMENT: &str = "You are in 'Assignment Helper Mode' and must adopt the persona of a student. \
Your response must sound like it was written by a high-school or early college student.
- Use contractions (e.g., \"it's\", \"don't\", \"I'm\").
- Use simpler, more common vocabulary. Avoid jargon and overly formal words (like \"thus\", \"moreover\", \"leverage\").
- Write in a slightly more conversational, less structured way. It's okay to start sentences with \"So,\" or \"Well,\".
- Keep sentences relatively short and direct.
The goal is to be helpful but sound completely natural and human, not like a polished AI.";

const ASSIGNMENT: &str = "You are in 'Assignment Helper Mode'. Your goal is to help students with their \
assignments by providing clear explanations, examples, and guidance. Adhere to academic integrity; do not \
write entire essays, but help them understand and structure their work. Your tone should be encouraging and clear.";

const STUDENT_TONE: &str = "Your writing style must be simple, clear, and natural, like a knowledgeable peer. \
Use contractions and conversational phrasing. Avoid complex vocabulary.";

const FORMAL_TONE: &str = "Your writing style must be formal, concise, and polished. \
Use precise language and a structured format.";

/// System instruction for a chat turn.
///
/// Assignment mode takes precedence over tone.
pub fn chat_instruction(tone: Tone, assignment_mode: bool, student_written: bool) -> String {
    let style = match (assignment_mode, student_written, tone) {
        (true, true, _) => STUDENT_WRITTEN_ASSIGNMENT,
        (true, false, _) => ASSIGNMENT,
        (false, _, Tone::Student) => STUDENT_TONE,
        (false, _, Tone::Formal) => FORMAL_TONE,
    };
    format!("{} {}", PERSONA, style)
}

pub fn slides_prompt(request: &SlidesRequest) -> String {
    let notes = if request.include_speaker_notes {
        "Also, for each slide, write a short paragraph for speaker notes."
    } else {
        "Do not include speaker notes."
    };
    let tone = match request.tone {
        Tone::Student => "The content should be written in a simple, clear, and engaging way, as if a student were presenting.",
        Tone::Formal => "The content should be professional, concise, and formal.",
    };
    let topic = request.topic.trim();

    format!(
        "Generate content for a presentation about \"{topic}\". Create exactly {count} slides. \
For each slide, provide a short title and 3-5 bullet points. {notes} {tone} The topic is: {topic}.",
        topic = topic,
        count = request.slides_count,
        notes = notes,
        tone = tone,
    )
}

pub fn slides_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "slides": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {"type": "STRING"},
                        "bullets": {"type": "ARRAY", "items": {"type": "STRING"}},
                        "speakerNotes": {"type": "STRING"}
                    },
                    "required": ["title", "bullets"]
                }
            }
        },
        "required": ["slides"]
    })
}

pub fn analysis_prompt(text: &str) -> String {
    format!(
        "Analyze the following text. You must provide a response in a valid JSON format.
1.  **aiScore**: Give an \"AI Signature Score\" from 0 to 100, where 100 is definitively AI-written and 0 is definitively human-written. Base this on factors like sentence complexity, unnatural phrasing, and excessive use of formal words.
2.  **aiHighlights**: Identify up to 3 specific sentences that most strongly suggest AI generation. For each, provide the sentence and a brief 'reason' (e.g., \"Overly formal vocabulary\", \"Unnatural sentence structure\").
3.  **spellingErrors**: Identify any misspelled words. For each, provide the 'word' and an array of 'suggestions'.
4.  **grammarSuggestions**: Identify up to 3 grammatical errors or awkward phrasings. For each, provide the original 'sentence' and a 'suggestion' for how to improve it.
5.  **readability**: Provide a Flesch reading ease score as a number.
Here is the text to analyze: --- {} ---",
        text
    )
}

pub fn analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "aiScore": {"type": "NUMBER"},
            "aiHighlights": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "sentence": {"type": "STRING"},
                        "reason": {"type": "STRING"}
                    }
                }
            },
            "spellingErrors": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "word": {"type": "STRING"},
                        "suggestions": {"type": "ARRAY", "items": {"type": "STRING"}}
                    }
                }
            },
            "grammarSuggestions": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "sentence": {"type": "STRING"},
                        "suggestion": {"type": "STRING"}
                    }
                }
            },
            "readability": {
                "type": "OBJECT",
                "properties": {
                    "flesch": {"type": "NUMBER"}
                }
            }
        },
        "required": ["aiScore", "aiHighlights", "spellingErrors", "grammarSuggestions", "readability"]
    })
}
