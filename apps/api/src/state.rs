use std::sync::Arc;

use crate::llm_client::LlmClient;
use crate::models::persona::PersonaCatalog;
use crate::roleplay::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Used directly only by the chat proxy; sessions reach it through `ModelGateway`.
    pub llm: LlmClient,
    pub sessions: SessionStore,
    pub personas: Arc<PersonaCatalog>,
}
