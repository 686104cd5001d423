use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::llm_client::DEFAULT_API_URL;

/// Application configuration loaded from environment variables.
/// Startup fails if the API key is missing.
#[derive(Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_api_url: String,
    pub port: u16,
    pub rust_log: String,
    pub request_timeout_secs: u64,
    /// Optional JSON file replacing the built-in persona catalog.
    pub personas_file: Option<PathBuf>,
    /// Sessions untouched for this long are dropped.
    pub session_idle_ttl_secs: u64,
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let anthropic_api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .context("Required environment variable 'ANTHROPIC_API_KEY' is not set")?;

        Ok(Config {
            anthropic_api_key,
            anthropic_api_url: lookup("ANTHROPIC_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            request_timeout_secs: lookup("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|| "120".to_string())
                .parse::<u64>()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
            personas_file: lookup("PERSONAS_FILE").map(PathBuf::from),
            session_idle_ttl_secs: lookup("SESSION_IDLE_TTL_SECS")
                .unwrap_or_else(|| "1800".to_string())
                .parse::<u64>()
                .context("SESSION_IDLE_TTL_SECS must be a whole number of seconds")?,
            max_sessions: lookup("MAX_SESSIONS")
                .unwrap_or_else(|| "1000".to_string())
                .parse::<usize>()
                .context("MAX_SESSIONS must be a positive integer")?,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("anthropic_api_key", &"<redacted>")
            .field("anthropic_api_url", &self.anthropic_api_url)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("personas_file", &self.personas_file)
            .field("session_idle_ttl_secs", &self.session_idle_ttl_secs)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}
