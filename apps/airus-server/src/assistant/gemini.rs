//! Gemini adapter for the completion service
//!
//! Talks to the Generative Language REST API (`models/{model}:generateContent`).
//! Structured output uses `responseMimeType: application/json` together with a
//! `responseSchema`. There are no retries.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::completion::{ChatPart, ChatTurn, CompletionError, CompletionService};

/// Header carrying the API key, so it never shows up in request URLs
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiConfig {
    api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, request: &GenerateContentRequest<'_>) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let response = Self::check_status(response).await?;
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Network(format!("Unreadable response: {}", e)))?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        debug!("Model {} returned {} characters", self.config.model, text.len());
        Ok(text)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CompletionError {
        let e = e.without_url();
        if e.is_timeout() {
            CompletionError::Timeout {
                timeout_secs: self.config.timeout.as_secs(),
            }
        } else if e.is_connect() {
            CompletionError::Network(format!("Connection failed: {}", e))
        } else {
            CompletionError::Network(e.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response, CompletionError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(CompletionError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }
}

/// `error.message` from a Google API error body, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(
        &self,
        system_instruction: &str,
        history: &[ChatTurn],
    ) -> Result<String, CompletionError> {
        let request = GenerateContentRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![ChatPart {
                    text: system_instruction.to_string(),
                }],
            }),
            contents: history.to_vec(),
            generation_config: None,
        };
        self.generate(&request).await
    }

    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Value, CompletionError> {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![ChatTurn::user(prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };
        let text = self.generate(&request).await?;
        serde_json::from_str(&text).map_err(|e| CompletionError::MalformedJson(e.to_string()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<ChatPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
}

#[derive(Deserialize, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_generate_url() {
        let client = GeminiClient::new(
            GeminiConfig::new("k")
                .with_base_url("http://localhost:8080/v1beta/")
                .with_model("gemini-test"),
        )
        .unwrap();
        assert_eq!(
            client.generate_url(),
            "http://localhost:8080/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_response_text_joins_parts_of_first_candidate() {
        let body: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "student!"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(body.text(), "Hello, student!");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let body: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.text(), "");
    }

    #[test]
    fn test_request_shape() {
        let schema = json!({"type": "OBJECT"});
        let request = GenerateContentRequest {
            system_instruction: Some(SystemInstruction {
                parts: vec![ChatPart {
                    text: "Be brief.".to_string(),
                }],
            }),
            contents: vec![ChatTurn::user("hi")],
            generation_config: Some(GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &schema,
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid."}}"#;
        assert_eq!(api_error_message(body), "API key not valid.");
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let client = GeminiClient::new(
            GeminiConfig::new("k")
                .with_base_url("http://127.0.0.1:9")
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        let err = client
            .complete("system", &[ChatTurn::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Network(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_transport_errors_do_not_leak_api_key() {
        let config = GeminiConfig::new("SUPER-SECRET-KEY")
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(5));
        assert!(!format!("{:?}", config).contains("SUPER-SECRET-KEY"));

        let client = GeminiClient::new(config).unwrap();
        let err = client
            .generate_json("prompt", &json!({"type": "OBJECT"}))
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(!message.contains("SUPER-SECRET-KEY"), "{}", message);
        assert!(!message.contains("key="), "{}", message);
    }
}
