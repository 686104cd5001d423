//! Response interpreter — pulls a reply or an evaluation out of raw model text.
//!
//! The evaluation path takes everything from the first `{` to the last `}` and
//! parses that. It tolerates prose around a single object, but a stray `{` in
//! leading commentary, or several objects in one reply, will produce a bad slice.

use serde_json::Value;
use thiserror::Error;

use crate::models::evaluation::{Category, Evaluation};

#[derive(Debug, Error)]
pub enum EvaluationParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("evaluation JSON is invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("evaluation JSON is not an object")]
    NotAnObject,

    #[error("evaluation is missing category '{0}'")]
    MissingCategory(&'static str),
}

/// Free-text mode: the trimmed reply, or `None` if nothing is left.
pub fn extract_reply(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Slice from the first `{` through the last `}`, if both exist in that order.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Structured mode: locate, parse, and check the five categories.
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, EvaluationParseError> {
    let candidate = extract_json_object(raw).ok_or(EvaluationParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(candidate)?;

    let object = value.as_object().ok_or(EvaluationParseError::NotAnObject)?;
    if let Some(missing) = Category::ALL
        .iter()
        .find(|c| !object.contains_key(c.key()))
    {
        return Err(EvaluationParseError::MissingCategory(missing.key()));
    }

    Ok(serde_json::from_value(value)?)
}
