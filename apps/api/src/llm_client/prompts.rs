// Shared prompt fragments used by more than one request type.

/// Closing line that asks for bare JSON.
pub const JSON_ONLY_INSTRUCTION: &str = "JSONのみを出力してください。";

/// Section header helper: prompts use `【title】` headings throughout.
pub fn section(title: &str, body: &str) -> String {
    format!("【{title}】\n{body}")
}
