// Thin pass-through to the provider for browser clients that cannot hold the API key.

pub mod handlers;

/// Used when `max_tokens` is absent, non-numeric or below one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
