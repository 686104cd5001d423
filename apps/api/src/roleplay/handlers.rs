//! Axum route handlers for personas and roleplay sessions.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::persona::{Difficulty, Persona};
use crate::roleplay::orchestrator::SessionOrchestrator;
use crate::roleplay::session::SessionView;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PersonaQuery {
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Serialize)]
pub struct PersonaListResponse {
    pub personas: Vec<Persona>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub persona_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SelectPersonaRequest {
    pub persona_id: u32,
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/personas
pub async fn handle_list_personas(
    State(state): State<AppState>,
    Query(query): Query<PersonaQuery>,
) -> Json<PersonaListResponse> {
    let personas = state
        .personas
        .list(query.difficulty)
        .into_iter()
        .cloned()
        .collect();
    Json(PersonaListResponse { personas })
}

/// POST /api/v1/sessions
///
/// Creates an idle session, or an active one when `persona_id` is supplied.
/// An empty body is allowed; anything else must be a valid request object.
pub async fn handle_create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let request: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid session request: {e}")))?
    };

    let persona = request
        .persona_id
        .map(|id| find_persona(&state, id))
        .transpose()?;

    let session = state.sessions.create().await?;
    let view = match persona {
        Some(persona) => session.select_persona(persona).await?,
        None => session.snapshot().await,
    };

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.snapshot().await))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/persona
pub async fn handle_select_persona(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectPersonaRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = find_session(&state, id).await?;
    let persona = find_persona(&state, request.persona_id)?;
    Ok(Json(session.select_persona(persona).await?))
}

/// POST /api/v1/sessions/:id/messages
///
/// Appends the counselor line and waits for the client's reply.
pub async fn handle_submit_utterance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UtteranceRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.submit_utterance(&request.text).await?))
}

/// POST /api/v1/sessions/:id/end
pub async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.end_session().await?))
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.reset().await))
}

/// GET /api/v1/sessions/:id/transcript
pub async fn handle_get_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<String, AppError> {
    let session = find_session(&state, id).await?;
    Ok(session.transcript().await)
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<SessionOrchestrator>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

fn find_persona(state: &AppState, id: u32) -> Result<Persona, AppError> {
    state
        .personas
        .get(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Persona {id} not found")))
}
