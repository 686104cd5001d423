pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::proxy::handlers as proxy;
use crate::roleplay::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Personas
        .route("/api/v1/personas", get(handlers::handle_list_personas))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/persona",
            post(handlers::handle_select_persona),
        )
        .route(
            "/api/v1/sessions/:id/messages",
            post(handlers::handle_submit_utterance),
        )
        .route("/api/v1/sessions/:id/end", post(handlers::handle_end_session))
        .route(
            "/api/v1/sessions/:id/reset",
            post(handlers::handle_reset_session),
        )
        .route(
            "/api/v1/sessions/:id/transcript",
            get(handlers::handle_get_transcript),
        )
        // Provider pass-through
        .route(
            "/api/chat",
            post(proxy::handle_chat)
                .options(proxy::handle_preflight)
                .fallback(proxy::method_not_allowed),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
