//! Prompt builder — renders persona and transcript into model instructions.
//!
//! Every function here is pure: same inputs, same text, no mutation of history.

use crate::llm_client::prompts::{section, JSON_ONLY_INSTRUCTION};
use crate::models::message::Message;
use crate::models::persona::Persona;

const TURN_PREAMBLE: &str = "あなたはキャリアコンサルタント試験のロールプレイで相談者役を演じています。";

const TURN_INSTRUCTIONS: &str = "\
- 相談者として自然に応答してください
- 感情や悩みをリアルに表現してください
- カウンセラーの質問に対して適切に答えつつ、徐々に本音や深い悩みを開示してください
- 短めの発言(1-3文程度)で返答してください
- 「」などの記号は使わず、自然な会話文だけを出力してください";

const EVALUATION_PREAMBLE: &str = "キャリアコンサルタント試験のロールプレイセッションを評価してください。";

const EVALUATION_SCHEMA: &str = r#"以下の観点で評価し、JSON形式で返してください：

{
  "listening": {
    "score": 0-100,
    "feedback": "傾聴姿勢についての具体的なフィードバック"
  },
  "questioning": {
    "score": 0-100,
    "feedback": "質問技法についての具体的なフィードバック"
  },
  "understanding": {
    "score": 0-100,
    "feedback": "問題把握についての具体的なフィードバック"
  },
  "rapport": {
    "score": 0-100,
    "feedback": "ラポール形成についての具体的なフィードバック"
  },
  "overall": {
    "score": 0-100,
    "feedback": "総合評価と改善アドバイス"
  }
}

scoreは0から100の整数、feedbackは文字列とし、上記5項目以外のキーは含めないでください。"#;

const EVALUATION_CRITERIA: &str = "\
評価基準:
- 傾聴姿勢: 相槌、共感、受容的態度
- 質問技法: 開かれた質問、掘り下げ、具体化
- 問題把握: 本質的な悩みの理解、整理
- ラポール形成: 信頼関係の構築";

/// One `label: content` line per message, oldest first.
pub fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt for the next client turn. `history` excludes `latest_utterance`.
pub fn build_turn_prompt(persona: &Persona, history: &[Message], latest_utterance: &str) -> String {
    let profile = format!(
        "{}\nシナリオ: {}",
        persona.biography, persona.description
    );

    [
        TURN_PREAMBLE.to_string(),
        section("相談者設定", &profile),
        section("会話履歴", &render_transcript(history)),
        section("カウンセラーの最新の発言", latest_utterance),
        section("指示", TURN_INSTRUCTIONS),
    ]
    .join("\n\n")
}

/// Prompt asking for the five-category rubric as a single JSON object.
pub fn build_evaluation_prompt(history: &[Message]) -> String {
    [
        EVALUATION_PREAMBLE.to_string(),
        section("会話履歴", &render_transcript(history)),
        EVALUATION_SCHEMA.to_string(),
        EVALUATION_CRITERIA.to_string(),
        JSON_ONLY_INSTRUCTION.to_string(),
    ]
    .join("\n\n")
}
