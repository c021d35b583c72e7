//! Text-to-speech playback with a single active utterance

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::synthesis::{SpeechSynthesizer, Utterance};
use crate::Result;

/// Plays replies aloud, preempting whatever was playing before
///
/// Cloning yields another handle to the same player, so every clone sees
/// the same current utterance.
#[derive(Clone)]
pub struct TtsPlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    language: String,
    current: Mutex<Option<u64>>,
    next_id: AtomicU64,
}

impl PlayerInner {
    fn current(&self) -> MutexGuard<'_, Option<u64>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TtsPlayer {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self::with_language(synthesizer, "en-US")
    }

    #[must_use]
    pub fn with_language(synthesizer: Arc<dyn SpeechSynthesizer>, language: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(PlayerInner {
                synthesizer,
                language: language.into(),
                current: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Speak `text`, stopping any utterance already in flight
    ///
    /// `on_done` runs when this utterance completes naturally. It never
    /// runs if the utterance is stopped or preempted by a later `speak`.
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer cannot start playback
    pub fn speak<F>(&self, text: &str, on_done: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.stop();

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        *self.inner.current() = Some(id);

        let player: Weak<PlayerInner> = Arc::downgrade(&self.inner);
        let on_end = Box::new(move || {
            let Some(player) = player.upgrade() else {
                return;
            };
            let finished_current = {
                let mut current = player.current();
                if *current == Some(id) {
                    *current = None;
                    true
                } else {
                    false
                }
            };
            if finished_current {
                on_done();
            }
        });

        let utterance = Utterance {
            language: self.inner.language.clone(),
            ..Utterance::new(text)
        };

        if let Err(e) = self.inner.synthesizer.speak(utterance, on_end) {
            let mut current = self.inner.current();
            if *current == Some(id) {
                *current = None;
            }
            return Err(e);
        }

        tracing::debug!(utterance = id, chars = text.len(), "speaking");
        Ok(())
    }

    /// Cancel any in-flight playback; safe when nothing is playing
    pub fn stop(&self) {
        let previous = self.inner.current().take();
        self.inner.synthesizer.cancel();
        if let Some(id) = previous {
            tracing::debug!(utterance = id, "playback stopped");
        }
    }

    /// Whether an utterance is currently playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.inner.current().is_some()
    }
}
