//! API handlers for the AiRus server
//!
//! Provides REST endpoints for:
//! - Chat, slide outlines and writing analysis
//! - File conversion (multipart upload, binary download)
//! - Tool listing and health

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tracing::{debug, info};

use crate::assistant::models::{
    Analysis, AnalyzeRequest, ChatRequest, ChatResponse, SlidesRequest, SlidesResponse,
};
use crate::dispatcher::registry::{ToolInfo, MAX_FILES_PER_REQUEST};
use crate::error::ApiError;
use crate::state::AppState;

const SERVICE_NAME: &str = "airus-server";

/// Everything except alphanumerics and `-._~` is percent-encoded in `filename*`
const FILENAME_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct RootResponse {
    #[serde(flatten)]
    pub health: HealthResponse,
    pub message: &'static str,
}

/// Handler: GET /
pub async fn handle_root() -> Json<RootResponse> {
    let Json(health) = handle_health().await;
    Json(RootResponse {
        health,
        message: "AiRus backend is running. Run the frontend separately to use the app.",
    })
}

#[derive(Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

/// Handler: GET /api/tools
pub async fn handle_list_tools(State(state): State<Arc<AppState>>) -> Json<ToolListResponse> {
    let tools: Vec<ToolInfo> = state.dispatcher.tools().map(ToolInfo::from).collect();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

/// Handler: POST /api/chat
pub async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    debug!("Chat request: assignment_mode={}", req.is_assignment_mode);
    let response = state
        .assistant
        .chat(req)
        .await
        .map_err(ApiError::assistant(
            "An error occurred while communicating with the AI service",
        ))?;
    Ok(Json(response))
}

/// Handler: POST /api/generate-ppt
pub async fn handle_generate_ppt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SlidesRequest>,
) -> Result<Json<SlidesResponse>, ApiError> {
    info!(
        "Slides request: topic={}, count={}",
        req.topic, req.slides_count
    );
    let response = state
        .assistant
        .generate_slides(req)
        .await
        .map_err(ApiError::assistant(
            "An error occurred while generating presentation content",
        ))?;
    Ok(Json(response))
}

/// Handler: POST /api/analyze
pub async fn handle_analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Analysis>, ApiError> {
    let analysis = state
        .assistant
        .analyze(req)
        .await
        .map_err(ApiError::assistant("An error occurred while analyzing the text"))?;
    Ok(Json(analysis))
}

/// Handler: POST /api/convert
///
/// Multipart form with a `tool` field and one or more `files` parts. Responds
/// with the converted file as an attachment.
pub async fn handle_convert(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut tool = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed upload: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "tool" => {
                tool = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Malformed tool field: {}", e)))?
                    .trim()
                    .to_string();
            }
            "files" => {
                if files.len() >= MAX_FILES_PER_REQUEST {
                    return Err(ApiError::InvalidRequest(format!(
                        "At most {} files can be uploaded at once.",
                        MAX_FILES_PER_REQUEST
                    )));
                }
                let name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidRequest(format!("Upload interrupted: {}", e)))?;
                let file = state
                    .store
                    .persist(name, content_type, &bytes)
                    .await
                    .map_err(|e| ApiError::Internal(format!("Could not store upload: {}", e)))?;
                files.push(file);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    info!("Convert request: tool={}, files={}", tool, files.len());
    let result = state.dispatcher.convert(&tool, files).await?;

    let headers = [
        (header::CONTENT_TYPE, result.mime_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&result.file_name),
        ),
    ];
    Ok((headers, result.bytes).into_response())
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();

    if fallback == file_name {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(file_name, FILENAME_UNRESERVED)
        )
    }
}
