mod config;
mod errors;
mod llm_client;
mod models;
mod proxy;
mod roleplay;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{LlmClient, ModelGateway};
use crate::models::persona::PersonaCatalog;
use crate::roleplay::store::{SessionLimits, SessionStore};
use crate::routes::build_router;
use crate::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing API key)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Roleplay API v{}", env!("CARGO_PKG_VERSION"));

    let personas = match &config.personas_file {
        Some(path) => PersonaCatalog::from_json_file(path)?,
        None => PersonaCatalog::builtin(),
    };
    info!("Persona catalog loaded ({} personas)", personas.len());

    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.anthropic_api_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    info!(
        "LLM client initialized (model: {}, endpoint: {})",
        llm_client::MODEL,
        llm.endpoint()
    );

    let gateway: Arc<dyn ModelGateway> = Arc::new(llm.clone());
    let sessions = SessionStore::new(
        gateway,
        SessionLimits {
            idle_ttl: Duration::from_secs(config.session_idle_ttl_secs),
            max_sessions: config.max_sessions,
        },
    );
    sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL);
    info!(
        "Session store ready (idle ttl {}s, max {})",
        config.session_idle_ttl_secs, config.max_sessions
    );

    let state = AppState {
        llm,
        sessions,
        personas: Arc::new(personas),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
