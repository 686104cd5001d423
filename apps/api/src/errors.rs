use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::GatewayError;
use crate::roleplay::interpreter::EvaluationParseError;
use crate::roleplay::session::SessionError;
use crate::roleplay::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Evaluation parse error: {0}")]
    EvaluationParse(#[from] EvaluationParseError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Transport(msg) => AppError::Transport(msg),
            GatewayError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::EmptyUtterance => AppError::Validation(e.to_string()),
            SessionError::WrongPhase { .. }
            | SessionError::Busy
            | SessionError::TranscriptTooShort { .. }
            | SessionError::Superseded => AppError::Conflict(e.to_string()),
            SessionError::Interrupted => AppError::Internal(anyhow::anyhow!(e)),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                "Method not allowed".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Transport(msg) => {
                tracing::error!("Transport error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "TRANSPORT_ERROR",
                    "The language model service could not be reached".to_string(),
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::EvaluationParse(e) => {
                tracing::error!("Evaluation parse error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "EVALUATION_PARSE_ERROR",
                    e.to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "code": code
        }));

        (status, body).into_response()
    }
}
