//! `/api/chat` — forwards `{ messages, max_tokens? }` to the provider unchanged.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::errors::AppError;
use crate::proxy::DEFAULT_MAX_TOKENS;
use crate::state::AppState;

/// POST /api/chat
///
/// Returns the provider's response JSON verbatim on success. Body problems,
/// including a missing content type, come back in the `{ error }` envelope.
pub async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) =
        body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let messages = match request.get("messages") {
        Some(messages @ Value::Array(_)) => messages,
        _ => return Err(AppError::Validation("Invalid messages format".to_string())),
    };
    let max_tokens = requested_max_tokens(&request);

    debug!(max_tokens, "Forwarding chat request");
    let response = state.llm.forward(messages, max_tokens).await?;
    Ok(Json(response))
}

/// OPTIONS /api/chat — preflight without CORS request headers.
pub async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Positive numbers are used (fractions rounded); anything else falls back to the default.
fn requested_max_tokens(request: &Value) -> u32 {
    request
        .get("max_tokens")
        .and_then(Value::as_f64)
        .map(f64::round)
        .filter(|n| *n >= 1.0)
        .map(|n| n.min(f64::from(u32::MAX)) as u32)
        .unwrap_or(DEFAULT_MAX_TOKENS)
}
