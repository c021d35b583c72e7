//! Terminal dictation engine
//!
//! Stands in for a microphone-backed recognizer on machines without one:
//! text handed to [`DictationRecognizer::dictate`] while listening is
//! reported the way a live engine reports a spoken phrase.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::recognition::{RecognitionConfig, RecognitionEvent, RecognitionResult, SpeechRecognizer};
use crate::{Error, Result};

/// Recognizer fed from typed text
pub struct DictationRecognizer {
    listening: AtomicBool,
    events: mpsc::UnboundedSender<RecognitionEvent>,
}

impl DictationRecognizer {
    /// Create a recognizer and the event stream to pump into a capture controller
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                listening: AtomicBool::new(false),
                events: tx,
            },
            rx,
        )
    }

    /// Whether a session is open
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Report `text` as one spoken phrase
    ///
    /// # Errors
    ///
    /// Returns error if no session is open
    pub fn dictate(&self, text: &str) -> Result<()> {
        if !self.is_listening() {
            return Err(Error::Recognition("not listening".to_string()));
        }

        let text = text.trim();
        self.emit(RecognitionEvent::SpeechStart);
        if let Some((head, _)) = text.rsplit_once(' ') {
            self.emit(RecognitionEvent::Result(RecognitionResult::interim(head)));
        }
        self.emit(RecognitionEvent::Result(RecognitionResult::finalized(text, 1.0)));
        self.emit(RecognitionEvent::SpeechEnd);
        Ok(())
    }

    fn emit(&self, event: RecognitionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("dictation event receiver dropped");
        }
    }
}

impl SpeechRecognizer for DictationRecognizer {
    fn start(&self, config: &RecognitionConfig) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(Error::Recognition("recognition already started".to_string()));
        }
        tracing::debug!(language = %config.language, "dictation listening");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.emit(RecognitionEvent::End);
        }
        Ok(())
    }
}
