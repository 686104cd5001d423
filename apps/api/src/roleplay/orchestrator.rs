//! Session orchestrator — drives one `Session` through the model gateway.
//!
//! The session lock is never held across a gateway call. Single-flight is
//! enforced by the session's own `in_flight` flag: a second action while one is
//! pending fails with `SessionError::Busy` instead of queueing.
//!
//! The gateway call and the step that applies its result run in a spawned task,
//! so an exchange always completes even if the caller stops waiting for it.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::llm_client::{GatewayError, ModelGateway};
use crate::models::persona::Persona;
use crate::roleplay::interpreter::{extract_reply, parse_evaluation};
use crate::roleplay::session::{Session, SessionError, SessionView};
use crate::roleplay::{EVALUATION_MAX_TOKENS, FALLBACK_REPLY, TURN_MAX_TOKENS};

pub struct SessionOrchestrator {
    session: Arc<Mutex<Session>>,
    gateway: Arc<dyn ModelGateway>,
}

impl SessionOrchestrator {
    pub fn new(id: Uuid, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(id))),
            gateway,
        }
    }

    pub async fn snapshot(&self) -> SessionView {
        self.session.lock().await.snapshot()
    }

    pub async fn transcript(&self) -> String {
        self.session.lock().await.transcript()
    }

    pub async fn select_persona(&self, persona: Persona) -> Result<SessionView, SessionError> {
        let mut session = self.session.lock().await;
        let persona_id = persona.id;
        session.select_persona(persona)?;
        info!(session_id = %session.id(), persona_id, "Session started");
        Ok(session.snapshot())
    }

    /// Counselor speaks, client answers. Gateway failures become the fallback line.
    pub async fn submit_utterance(&self, text: &str) -> Result<SessionView, SessionError> {
        let (ticket, prompt) = self.session.lock().await.begin_turn(text)?;

        let session = self.session.clone();
        let gateway = self.gateway.clone();
        let exchange = tokio::spawn(async move {
            let reply = match generate_reply(gateway.as_ref(), &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Client turn generation failed, using fallback reply: {e}");
                    FALLBACK_REPLY.to_string()
                }
            };

            let mut session = session.lock().await;
            session.complete_turn(ticket, reply).inspect_err(|_| {
                debug!(session_id = %session.id(), "Discarding client reply for a reset session");
            })?;
            Ok(session.snapshot())
        });

        join_exchange(exchange).await
    }

    /// Ends the session and requests the rubric. A failed evaluation still ends it.
    pub async fn end_session(&self) -> Result<SessionView, SessionError> {
        let (ticket, prompt) = self.session.lock().await.begin_evaluation()?;

        let session = self.session.clone();
        let gateway = self.gateway.clone();
        let exchange = tokio::spawn(async move {
            let outcome = match gateway.complete(&prompt, EVALUATION_MAX_TOKENS).await {
                Ok(raw) => parse_evaluation(&raw).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(reason) = &outcome {
                warn!("Evaluation unavailable: {reason}");
            }

            let mut session = session.lock().await;
            session.complete_evaluation(ticket, outcome).inspect_err(|_| {
                debug!(session_id = %session.id(), "Discarding evaluation for a reset session");
            })?;
            info!(
                session_id = %session.id(),
                status = ?session.evaluation_status(),
                "Session ended"
            );
            Ok(session.snapshot())
        });

        join_exchange(exchange).await
    }

    pub async fn reset(&self) -> SessionView {
        let mut session = self.session.lock().await;
        session.reset();
        info!(session_id = %session.id(), "Session reset");
        session.snapshot()
    }
}

async fn generate_reply(gateway: &dyn ModelGateway, prompt: &str) -> Result<String, GatewayError> {
    let raw = gateway.complete(prompt, TURN_MAX_TOKENS).await?;
    extract_reply(&raw)
        .ok_or_else(|| GatewayError::Upstream("model returned an empty reply".to_string()))
}

async fn join_exchange(
    exchange: JoinHandle<Result<SessionView, SessionError>>,
) -> Result<SessionView, SessionError> {
    exchange.await.unwrap_or_else(|e| {
        error!("Exchange task did not finish: {e}");
        Err(SessionError::Interrupted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGateway;
    use crate::models::message::Role;
    use crate::models::persona::PersonaCatalog;
    use crate::roleplay::session::{EvaluationStatus, SessionPhase};

    const EVALUATION_JSON: &str = r#"{
        "listening": {"score": 82, "feedback": "相槌が自然"},
        "questioning": {"score": 64, "feedback": "開かれた質問を増やす"},
        "understanding": {"score": 71, "feedback": "要約ができている"},
        "rapport": {"score": 88, "feedback": "安心感がある"},
        "overall": {"score": 76, "feedback": "良好"}
    }"#;

    fn persona(id: u32) -> Persona {
        PersonaCatalog::builtin().get(id).unwrap().clone()
    }

    fn orchestrator(gateway: Arc<ScriptedGateway>) -> SessionOrchestrator {
        SessionOrchestrator::new(Uuid::new_v4(), gateway)
    }

    async fn wait_until_busy(orchestrator: &SessionOrchestrator) {
        while !orchestrator.snapshot().await.busy {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_full_session_produces_evaluation() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .reply("元気です")
                .reply("  最近眠れなくて...  ")
                .reply("上司との関係が一番つらいです。")
                .reply(&format!("評価結果です。\n{EVALUATION_JSON}")),
        );
        let orchestrator = orchestrator(gateway.clone());

        orchestrator.select_persona(persona(1)).await.unwrap();

        let view = orchestrator.submit_utterance("こんにちは").await.unwrap();
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[1].role, Role::Counselor);
        assert_eq!(view.messages[1].content, "こんにちは");
        assert_eq!(view.messages[2].role, Role::Client);
        assert_eq!(view.messages[2].content, "元気です");
        assert!(!view.can_end);

        orchestrator.submit_utterance("最近どうですか").await.unwrap();
        let view = orchestrator.submit_utterance("何が一番つらいですか").await.unwrap();
        assert_eq!(view.messages.len(), 7);
        assert_eq!(view.messages[4].content, "最近眠れなくて...");
        assert!(view.can_end);

        let view = orchestrator.end_session().await.unwrap();
        assert_eq!(view.phase, SessionPhase::Ended);
        assert_eq!(view.evaluation_status, EvaluationStatus::Ready);
        let evaluation = view.evaluation.unwrap();
        assert_eq!(evaluation.listening.score, 82);
        assert_eq!(evaluation.overall.feedback, "良好");

        let calls = gateway.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[..3].iter().all(|(_, budget)| *budget == TURN_MAX_TOKENS));
        assert_eq!(calls[3].1, EVALUATION_MAX_TOKENS);
        assert!(calls[2].0.contains("相談者: 元気です"));
        assert!(calls[3].0.contains("カウンセラー: 何が一番つらいですか"));
    }

    #[tokio::test]
    async fn test_gateway_failure_appends_fallback_and_keeps_session_active() {
        let gateway = Arc::new(
            ScriptedGateway::new().fail(GatewayError::Transport("connection refused".to_string())),
        );
        let orchestrator = orchestrator(gateway);
        orchestrator.select_persona(persona(2)).await.unwrap();

        let view = orchestrator.submit_utterance("こんにちは").await.unwrap();
        assert_eq!(view.phase, SessionPhase::Active);
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[2].role, Role::Client);
        assert_eq!(view.messages[2].content, FALLBACK_REPLY);
        assert!(!view.busy);
    }

    #[tokio::test]
    async fn test_upstream_error_and_blank_reply_both_fall_back() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .fail(GatewayError::Upstream("status 500: overloaded".to_string()))
                .reply("   "),
        );
        let orchestrator = orchestrator(gateway);
        orchestrator.select_persona(persona(1)).await.unwrap();

        orchestrator.submit_utterance("一つ目").await.unwrap();
        let view = orchestrator.submit_utterance("二つ目").await.unwrap();
        assert_eq!(view.messages[2].content, FALLBACK_REPLY);
        assert_eq!(view.messages[4].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_unparseable_evaluation_ends_session_as_unavailable() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .reply("a")
                .reply("b")
                .reply("c")
                .reply("申し訳ありませんが評価できません。"),
        );
        let orchestrator = orchestrator(gateway);
        orchestrator.select_persona(persona(1)).await.unwrap();
        for text in ["1", "2", "3"] {
            orchestrator.submit_utterance(text).await.unwrap();
        }

        let view = orchestrator.end_session().await.unwrap();
        assert_eq!(view.phase, SessionPhase::Ended);
        assert!(view.evaluation.is_none());
        assert_eq!(view.evaluation_status, EvaluationStatus::Unavailable);
        assert!(view.evaluation_error.unwrap().contains("no JSON object"));
    }

    #[tokio::test]
    async fn test_gateway_failure_during_evaluation_is_not_faked() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .reply("a")
                .reply("b")
                .reply("c")
                .fail(GatewayError::Transport("timed out".to_string())),
        );
        let orchestrator = orchestrator(gateway);
        orchestrator.select_persona(persona(1)).await.unwrap();
        for text in ["1", "2", "3"] {
            orchestrator.submit_utterance(text).await.unwrap();
        }

        let view = orchestrator.end_session().await.unwrap();
        assert!(view.evaluation.is_none());
        assert_eq!(view.evaluation_status, EvaluationStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_end_session_rejected_with_short_transcript() {
        let gateway = Arc::new(ScriptedGateway::new().reply("a").reply("b"));
        let orchestrator = orchestrator(gateway.clone());
        orchestrator.select_persona(persona(1)).await.unwrap();
        orchestrator.submit_utterance("1").await.unwrap();
        orchestrator.submit_utterance("2").await.unwrap();

        let err = orchestrator.end_session().await.unwrap_err();
        assert_eq!(err, SessionError::TranscriptTooShort { len: 5 });
        assert_eq!(gateway.calls().len(), 2);
        assert_eq!(orchestrator.snapshot().await.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected_as_busy() {
        let gateway = Arc::new(ScriptedGateway::gated().reply("ゆっくり考えます"));
        let orchestrator = Arc::new(orchestrator(gateway.clone()));
        orchestrator.select_persona(persona(1)).await.unwrap();

        let pending = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit_utterance("一つ目").await })
        };
        wait_until_busy(&orchestrator).await;

        assert_eq!(
            orchestrator.submit_utterance("二つ目").await.unwrap_err(),
            SessionError::Busy
        );

        gateway.release();
        let view = pending.await.unwrap().unwrap();
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[1].content, "一つ目");
        assert_eq!(view.messages[2].content, "ゆっくり考えます");
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_arriving_after_reset_is_discarded() {
        let gateway = Arc::new(ScriptedGateway::gated().reply("遅れた返事"));
        let orchestrator = Arc::new(orchestrator(gateway.clone()));
        orchestrator.select_persona(persona(1)).await.unwrap();

        let pending = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit_utterance("こんにちは").await })
        };
        wait_until_busy(&orchestrator).await;

        let view = orchestrator.reset().await;
        assert_eq!(view.phase, SessionPhase::Idle);
        orchestrator.select_persona(persona(3)).await.unwrap();

        gateway.release();
        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            SessionError::Superseded
        );

        let view = orchestrator.snapshot().await;
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].content, persona(3).greeting);
        assert!(!view.busy);
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_leave_session_busy() {
        let gateway = Arc::new(
            ScriptedGateway::gated()
                .reply("少し考えてから話します")
                .reply("次の返事"),
        );
        let orchestrator = Arc::new(orchestrator(gateway.clone()));
        orchestrator.select_persona(persona(1)).await.unwrap();

        let caller = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.submit_utterance("一つ目").await })
        };
        wait_until_busy(&orchestrator).await;

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        gateway.release();
        while orchestrator.snapshot().await.busy {
            tokio::task::yield_now().await;
        }

        let view = orchestrator.snapshot().await;
        assert_eq!(view.messages.len(), 3);
        assert_eq!(view.messages[1].content, "一つ目");
        assert_eq!(view.messages[2].content, "少し考えてから話します");

        gateway.release();
        let view = orchestrator.submit_utterance("二つ目").await.unwrap();
        assert_eq!(view.messages.len(), 5);
        assert_eq!(view.messages[4].content, "次の返事");
    }

    #[tokio::test]
    async fn test_dropped_caller_still_completes_evaluation() {
        let gateway = Arc::new(
            ScriptedGateway::gated()
                .reply("a")
                .reply("b")
                .reply("c")
                .reply(EVALUATION_JSON),
        );
        let orchestrator = Arc::new(orchestrator(gateway.clone()));
        orchestrator.select_persona(persona(1)).await.unwrap();
        for text in ["1", "2", "3"] {
            gateway.release();
            orchestrator.submit_utterance(text).await.unwrap();
        }

        let caller = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.end_session().await })
        };
        wait_until_busy(&orchestrator).await;
        caller.abort();

        gateway.release();
        while orchestrator.snapshot().await.busy {
            tokio::task::yield_now().await;
        }

        let view = orchestrator.snapshot().await;
        assert_eq!(view.phase, SessionPhase::Ended);
        assert_eq!(view.evaluation_status, EvaluationStatus::Ready);
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .reply("a")
                .reply("b")
                .reply("c")
                .reply(EVALUATION_JSON),
        );
        let orchestrator = orchestrator(gateway);
        orchestrator.select_persona(persona(1)).await.unwrap();
        for text in ["1", "2", "3"] {
            orchestrator.submit_utterance(text).await.unwrap();
        }
        orchestrator.end_session().await.unwrap();

        let view = orchestrator.reset().await;
        assert_eq!(view.phase, SessionPhase::Idle);
        assert!(view.messages.is_empty());
        assert!(view.evaluation.is_none());
        assert!(view.persona.is_none());
        assert_eq!(view.evaluation_status, EvaluationStatus::NotRequested);
    }
}
