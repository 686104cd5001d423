//! Session state machine: `idle → active → ended`, with `reset` back to `idle`.
//!
//! The session itself does no I/O. Model calls are split into a `begin_*` step
//! that validates, mutates, and hands back a prompt plus a `Ticket`, and a
//! `complete_*` step that applies the result. A ticket issued before a reset
//! is rejected, so late responses never touch a fresh session.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::evaluation::{Evaluation, ScoreCard};
use crate::models::message::Message;
use crate::models::persona::Persona;
use crate::roleplay::prompts::{build_evaluation_prompt, build_turn_prompt, render_transcript};
use crate::roleplay::MIN_TRANSCRIPT_LEN;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    NotRequested,
    Pending,
    Ready,
    Unavailable,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is {actual:?}, operation requires {expected:?}")]
    WrongPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },

    #[error("utterance must not be empty")]
    EmptyUtterance,

    #[error("an exchange is already in flight for this session")]
    Busy,

    #[error(
        "transcript has {len} messages, at least {min} are required to end the session",
        min = MIN_TRANSCRIPT_LEN
    )]
    TranscriptTooShort { len: usize },

    #[error("session was reset while the request was in flight")]
    Superseded,

    #[error("the exchange task stopped before it finished")]
    Interrupted,
}

/// Issued when an exchange starts; must be handed back to complete it.
#[must_use]
#[derive(Debug)]
pub struct Ticket {
    generation: u64,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    /// Bumped on every reset.
    generation: u64,
    persona: Option<Persona>,
    messages: Vec<Message>,
    phase: SessionPhase,
    evaluation: Option<Evaluation>,
    evaluation_error: Option<String>,
    in_flight: bool,
}

/// Serializable snapshot handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub persona: Option<Persona>,
    pub messages: Vec<Message>,
    pub evaluation: Option<Evaluation>,
    pub evaluation_status: EvaluationStatus,
    pub evaluation_error: Option<String>,
    /// Display rows for the evaluation; empty until one is ready.
    pub scorecard: Vec<ScoreCard>,
    pub busy: bool,
    pub can_end: bool,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            generation: 0,
            persona: None,
            messages: Vec::new(),
            phase: SessionPhase::Idle,
            evaluation: None,
            evaluation_error: None,
            in_flight: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn can_end(&self) -> bool {
        self.phase == SessionPhase::Active
            && !self.in_flight
            && self.messages.len() >= MIN_TRANSCRIPT_LEN
    }

    pub fn evaluation_status(&self) -> EvaluationStatus {
        match (self.phase, &self.evaluation, self.in_flight) {
            (SessionPhase::Ended, Some(_), _) => EvaluationStatus::Ready,
            (SessionPhase::Ended, None, true) => EvaluationStatus::Pending,
            (SessionPhase::Ended, None, false) => EvaluationStatus::Unavailable,
            _ => EvaluationStatus::NotRequested,
        }
    }

    /// Idle → active. Seeds the transcript with the persona's greeting.
    pub fn select_persona(&mut self, persona: Persona) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Idle)?;
        self.messages.push(Message::client(persona.greeting.clone()));
        self.persona = Some(persona);
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// Appends the counselor line and returns the prompt for the client's reply.
    pub fn begin_turn(&mut self, text: &str) -> Result<(Ticket, String), SessionError> {
        let persona = match (self.phase, &self.persona) {
            (SessionPhase::Active, Some(persona)) => persona,
            (actual, _) => {
                return Err(SessionError::WrongPhase {
                    expected: SessionPhase::Active,
                    actual,
                })
            }
        };
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        let utterance = text.trim();
        if utterance.is_empty() {
            return Err(SessionError::EmptyUtterance);
        }

        let prompt = build_turn_prompt(persona, &self.messages, utterance);
        self.messages.push(Message::counselor(utterance));
        self.in_flight = true;
        Ok((self.ticket(), prompt))
    }

    pub fn complete_turn(&mut self, ticket: Ticket, reply: String) -> Result<(), SessionError> {
        self.redeem(ticket)?;
        self.messages.push(Message::client(reply));
        Ok(())
    }

    /// Active → ended. Returns the prompt for the rubric evaluation.
    pub fn begin_evaluation(&mut self) -> Result<(Ticket, String), SessionError> {
        self.require_phase(SessionPhase::Active)?;
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        if self.messages.len() < MIN_TRANSCRIPT_LEN {
            return Err(SessionError::TranscriptTooShort {
                len: self.messages.len(),
            });
        }

        let prompt = build_evaluation_prompt(&self.messages);
        self.phase = SessionPhase::Ended;
        self.in_flight = true;
        Ok((self.ticket(), prompt))
    }

    /// Stores the evaluation, or the reason it is unavailable.
    pub fn complete_evaluation(
        &mut self,
        ticket: Ticket,
        outcome: Result<Evaluation, String>,
    ) -> Result<(), SessionError> {
        self.redeem(ticket)?;
        match outcome {
            Ok(evaluation) => self.evaluation = Some(evaluation),
            Err(reason) => self.evaluation_error = Some(reason),
        }
        Ok(())
    }

    /// Back to idle from any phase. Outstanding tickets become stale.
    pub fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::new(self.id)
        };
    }

    pub fn transcript(&self) -> String {
        render_transcript(&self.messages)
    }

    pub fn snapshot(&self) -> SessionView {
        SessionView {
            id: self.id,
            phase: self.phase,
            persona: self.persona.clone(),
            messages: self.messages.clone(),
            evaluation: self.evaluation.clone(),
            evaluation_status: self.evaluation_status(),
            evaluation_error: self.evaluation_error.clone(),
            scorecard: self
                .evaluation
                .as_ref()
                .map(Evaluation::scorecard)
                .unwrap_or_default(),
            busy: self.in_flight,
            can_end: self.can_end(),
        }
    }

    fn require_phase(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
        }
    }

    fn redeem(&mut self, ticket: Ticket) -> Result<(), SessionError> {
        if ticket.generation != self.generation || !self.in_flight {
            return Err(SessionError::Superseded);
        }
        self.in_flight = false;
        Ok(())
    }
}

#[cfg(test)]
impl Session {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }
}
