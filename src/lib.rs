//! Talkback - Conversational English practice with pronunciation scoring
//!
//! This library provides the pieces of a spoken practice session:
//! - Speech capture with a silence watchdog and pronunciation scoring
//! - Spoken replies through a pluggable synthesizer
//! - Conversation state shared by front ends
//! - An HTTP relay to an OpenAI-compatible chat model
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Front ends                   │
//! │   Terminal chat  │  Static web UI            │
//! └────────────────────┬─────────────────────────┘
//!                      │ Conversation + ChatClient
//! ┌────────────────────▼─────────────────────────┐
//! │               Talkback server                │
//! │   /api/chat  │  /api/transcribe  │  /health  │
//! └────────────────────┬─────────────────────────┘
//!                      │ ChatRelay
//! ┌────────────────────▼─────────────────────────┐
//! │        OpenAI-compatible chat model          │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod feedback;
pub mod message;
pub mod relay;
pub mod voice;

pub use client::{ChatBackend, ChatClient};
pub use config::Config;
pub use conversation::{Conversation, InputSource, TurnOutcome, TurnState};
pub use error::{Error, Result};
pub use feedback::pronunciation_feedback;
pub use message::{ConversationContext, Message, Role};
pub use relay::ChatRelay;
