// Roleplay session core: prompt construction, model output interpretation,
// the per-session state machine, and the orchestrator that drives the gateway.
// All model calls go through `llm_client::ModelGateway`.

pub mod handlers;
pub mod interpreter;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod store;

/// Token budget for one in-character client reply.
pub const TURN_MAX_TOKENS: u32 = 1000;
/// Token budget for the rubric evaluation.
pub const EVALUATION_MAX_TOKENS: u32 = 2000;
/// Messages required before a session may be ended, opening greeting included.
pub const MIN_TRANSCRIPT_LEN: usize = 6;
/// Client line appended when a turn cannot be generated.
pub const FALLBACK_REPLY: &str = "すみません、少し考えさせてください...";
