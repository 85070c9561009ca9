use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Could not start conversation: {0}")]
    ConversationStart(String),

    #[error("Could not send message: {0}")]
    MessageSend(String),

    #[error("Upstream stream failed: {0}")]
    UpstreamStream(String),

    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ConversationUnavailable { .. } => AppError::ConversationStart(err.to_string()),
            LlmError::MessageRejected { .. } => AppError::MessageSend(err.to_string()),
            LlmError::StreamInterrupted(_) => AppError::UpstreamStream(err.to_string()),
            LlmError::Timeout(_) => AppError::UpstreamTimeout(err.to_string()),
            LlmError::Cancelled => AppError::Cancelled,
            LlmError::EmptyContent | LlmError::InvalidJson { .. } => {
                AppError::Generation(err.to_string())
            }
            LlmError::Http(_) | LlmError::InvalidConfig(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl AppError {
    /// Machine-usable error code shared by JSON responses and SSE error events.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ConversationStart(_) => "CONVERSATION_START_FAILED",
            AppError::MessageSend(_) => "MESSAGE_SEND_FAILED",
            AppError::UpstreamStream(_) => "UPSTREAM_STREAM_FAILED",
            AppError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            AppError::Cancelled => "REQUEST_CANCELLED",
            AppError::Generation(_) => "GENERATION_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConversationStart(_)
            | AppError::MessageSend(_)
            | AppError::UpstreamStream(_)
            | AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message. Upstream details are logged here, never returned.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::ConversationStart(msg) | AppError::MessageSend(msg) => {
                tracing::error!("Upstream error: {msg}");
                "Could not reach the interview service. Please try again.".to_string()
            }
            AppError::UpstreamStream(msg) | AppError::UpstreamTimeout(msg) => {
                tracing::error!("Upstream stream error: {msg}");
                "The interview service stopped responding. Please try again.".to_string()
            }
            AppError::Cancelled => "The request was cancelled".to_string(),
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                "Could not generate a usable answer. Please try again.".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.public_message()
            }
        }));

        (self.status(), body).into_response()
    }
}
