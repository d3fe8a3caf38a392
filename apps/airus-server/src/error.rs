//! Error types for the AiRus server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::assistant::AssistantError;
use crate::dispatcher::{ConversionError, ConversionErrorKind};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    /// The model call failed; `message` is what the user sees
    #[error("{message}: {source}")]
    Upstream {
        message: &'static str,
        source: AssistantError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map an assistant failure, using `message` for anything the user cannot fix.
    pub fn assistant(message: &'static str) -> impl FnOnce(AssistantError) -> ApiError {
        move |err| match err {
            AssistantError::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Upstream {
                message,
                source: other,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conversion(err) => match err.kind {
                ConversionErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
                _ if err.is_client_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Upstream { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::Conversion(err) => err.user_message(),
            ApiError::Upstream { message, source } => {
                tracing::error!("{}: {}", message, source);
                format!("{}.", message)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal error".to_string()
            }
        };
        if status.is_server_error() {
            if let ApiError::Conversion(err) = &self {
                tracing::error!("Conversion error: {}", err);
            }
        }

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
