//! Conversation state for a practice session
//!
//! Holds the message history and the per-turn state a front end renders:
//! whether a reply is pending, the current error banner, whether voice
//! capture is enabled, and whether a reply is being spoken.
//!
//! A turn is split into [`Conversation::begin_turn`] and
//! [`Conversation::complete_turn`] so a front end can keep handling input
//! while the relay call is in flight; [`Conversation::submit_text`] and
//! [`Conversation::submit_voice`] run both halves back to back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::ChatBackend;
use crate::message::{ConversationContext, Message, Role};
use crate::voice::{PronunciationResult, TtsPlayer};
use crate::Result;

/// Opening line spoken when a session starts
pub const GREETING: &str =
    "Hi! I'm here to chat and help you practice English. Feel free to start speaking or typing!";

/// Banner text when a failure has no description
pub const UNKNOWN_FAILURE: &str = "An unknown error occurred";

/// Where a submitted turn came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Typed,
    Voice,
}

/// Whether a reply is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Composing,
    Sending,
}

/// Result of submitting a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant answered
    Replied(Message),
    /// The relay call failed; the reason is also on the error banner
    Failed(String),
    /// Nothing was sent (empty input, input disabled)
    Ignored,
}

/// A relay request produced by [`Conversation::begin_turn`]
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Text of the new user turn
    pub message: String,
    /// History before the new turn
    pub context: ConversationContext,
}

/// One practice conversation
pub struct Conversation {
    backend: Arc<dyn ChatBackend>,
    player: TtsPlayer,
    messages: Vec<Message>,
    in_flight: usize,
    error: Option<String>,
    recording_enabled: bool,
    speaking: Arc<AtomicBool>,
}

impl Conversation {
    #[must_use]
    pub fn new(backend: Arc<dyn ChatBackend>, player: TtsPlayer) -> Self {
        Self {
            backend,
            player,
            messages: Vec::new(),
            in_flight: 0,
            error: None,
            recording_enabled: true,
            speaking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open an empty conversation with the greeting, spoken aloud
    pub fn greet(&mut self) {
        if !self.messages.is_empty() {
            return;
        }
        let greeting = Message::assistant(GREETING);
        self.speak(&greeting.content);
        self.messages.push(greeting);
    }

    /// Message history in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Current turn state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        if self.in_flight > 0 {
            TurnState::Sending
        } else {
            TurnState::Composing
        }
    }

    /// Error banner text, kept until the next successful reply
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether voice capture is offered right now
    #[must_use]
    pub const fn recording_enabled(&self) -> bool {
        self.recording_enabled
    }

    /// Whether a reply is being spoken
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Reference text for scoring the next spoken turn
    #[must_use]
    pub fn expected_text(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    /// Record a user turn and produce the relay request for it
    ///
    /// Returns `None` when the input is blank, when typing while a reply is
    /// pending, or when speaking while voice capture is disabled.
    pub fn begin_turn(&mut self, text: &str, source: InputSource) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }
        match source {
            InputSource::Typed if self.in_flight > 0 => {
                tracing::debug!("typed input ignored while a reply is pending");
                return None;
            }
            InputSource::Voice if !self.recording_enabled => {
                tracing::debug!("voice input ignored while capture is disabled");
                return None;
            }
            InputSource::Voice => self.recording_enabled = false,
            InputSource::Typed => {}
        }

        let context = ConversationContext::new(self.messages.clone());
        let user = Message::user(text);
        let message = user.content.clone();
        self.messages.push(user);
        self.in_flight += 1;

        tracing::debug!(?source, history = context.messages.len(), "turn submitted");
        Some(PendingTurn { message, context })
    }

    /// Apply the relay's answer to a turn started with `begin_turn`
    pub fn complete_turn(&mut self, reply: Result<Message>) -> TurnOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);

        match reply {
            Ok(reply) => {
                let reply = if reply.role == Role::Assistant {
                    reply
                } else {
                    Message::assistant(reply.content)
                };
                self.error = None;
                self.recording_enabled = true;
                self.speak(&reply.content);
                self.messages.push(reply.clone());
                TurnOutcome::Replied(reply)
            }
            Err(e) => {
                tracing::error!(error = %e, "error processing message");
                let reason = e.to_string();
                let reason = if reason.trim().is_empty() {
                    UNKNOWN_FAILURE.to_string()
                } else {
                    reason
                };
                self.error = Some(reason.clone());
                self.recording_enabled = true;
                TurnOutcome::Failed(reason)
            }
        }
    }

    /// Submit typed text and wait for the reply
    pub async fn submit_text(&mut self, text: &str) -> TurnOutcome {
        self.submit(text, InputSource::Typed).await
    }

    /// Submit a finalized voice capture and wait for the reply
    pub async fn submit_voice(&mut self, result: &PronunciationResult) -> TurnOutcome {
        self.submit(&result.message, InputSource::Voice).await
    }

    async fn submit(&mut self, text: &str, source: InputSource) -> TurnOutcome {
        let Some(turn) = self.begin_turn(text, source) else {
            return TurnOutcome::Ignored;
        };
        let reply = self
            .backend
            .send_message(&turn.message, &turn.context)
            .await;
        self.complete_turn(reply)
    }

    /// Handle to the relay backend, for running a pending turn elsewhere
    #[must_use]
    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// Speak the most recent assistant message again
    pub fn replay_last(&self) {
        if let Some(message) = self.messages.iter().rev().find(|m| m.role == Role::Assistant) {
            self.speak(&message.content);
        }
    }

    /// Stop any reply being spoken
    pub fn stop_speaking(&self) {
        self.player.stop();
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Clear history and the error banner
    pub fn reset(&mut self) {
        self.messages.clear();
        self.error = None;
        tracing::debug!("conversation reset");
    }

    fn speak(&self, text: &str) {
        self.speaking.store(true, Ordering::SeqCst);
        let speaking = Arc::clone(&self.speaking);
        if let Err(e) = self
            .player
            .speak(text, move || speaking.store(false, Ordering::SeqCst))
        {
            tracing::warn!(error = %e, "failed to speak reply");
            self.speaking.store(false, Ordering::SeqCst);
        }
    }
}
