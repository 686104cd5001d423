/// LLM Client — the single point of entry for all Claude API calls in the roleplay service.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Session code talks to the `ModelGateway` trait; the proxy endpoint uses `LlmClient::forward`.
///
/// Model: claude-sonnet-4-20250514 (hardcoded — do not make configurable to prevent drift)
use std::fmt;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for every completion request.
pub const MODEL: &str = "claude-sonnet-4-20250514";

/// Failure of a single gateway call. There is no retry; callers decide what to surface.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response (connect, timeout, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider answered, but with a non-success status or an unexpected envelope.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

/// One prompt in, one completion out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a, M: Serialize> {
    model: &'a str,
    max_tokens: u32,
    messages: M,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Wraps the Anthropic Messages API. One attempt per call.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl LlmClient {
    pub fn new(api_key: String, endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends a single user-role prompt and returns the validated response envelope.
    pub async fn call(&self, prompt: &str, max_tokens: u32) -> Result<LlmResponse, GatewayError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            messages: [AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let body = self.post(&request_body).await?;

        let llm_response: LlmResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Upstream(format!("unexpected response envelope: {e}"))
        })?;

        if let Some(usage) = &llm_response.usage {
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(llm_response)
    }

    /// Forwards caller-supplied messages untouched and returns the provider JSON verbatim.
    pub async fn forward(&self, messages: &Value, max_tokens: u32) -> Result<Value, GatewayError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens,
            messages,
        };

        let body = self.post(&request_body).await?;

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Upstream(format!("response was not JSON: {e}")))
    }

    async fn post<B: Serialize>(&self, request_body: &B) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request_body)
            .send()
            .await
            .map_err(|e| {
                warn!("LLM request failed before a response arrived: {e}");
                GatewayError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("LLM API returned {}: {}", status, message);
            return Err(GatewayError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                message
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl ModelGateway for LlmClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GatewayError> {
        let response = self.call(prompt, max_tokens).await?;
        response
            .text()
            .map(str::to_owned)
            .ok_or_else(|| GatewayError::Upstream("response contained no text block".to_string()))
    }
}
