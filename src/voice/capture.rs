//! Speech capture with silence-based auto-stop and pronunciation scoring
//!
//! [`SpeechCapture`] owns one recognition engine for its whole lifetime.
//! Engine events are pushed in through [`SpeechCapture::handle_event`];
//! every finalized transcript is scored against the expected text and sent
//! to the receiver returned by [`SpeechCapture::new`].
//!
//! ```text
//!          start()                       stop() / silence / error / end
//!   Idle ───────────▶ Recording ──────────────────────────────────────▶ Idle
//!                        │  final result
//!                        ▼
//!                  processing = true  (start() disabled until reset())
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::recognition::{
    RecognitionConfig, RecognitionErrorKind, RecognitionEvent, RecognitionResult,
    SpeechRecognizer,
};
use super::similarity::pronunciation_score;

/// Silence after the last speech activity that ends a recording session
pub const SILENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Scores below this (with an expected text) get a clarifying suffix
pub const MISMATCH_THRESHOLD: f64 = 0.6;

/// Outcome of one finalized recognition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationResult {
    pub transcript: String,
    /// Recognizer confidence in [0, 1]
    pub confidence: f64,
    /// Similarity to the expected text in [0, 1]
    pub pronunciation_score: f64,
    /// Text to submit as the user's turn
    pub message: String,
}

impl PronunciationResult {
    /// Score a transcript and compose the outgoing message
    #[must_use]
    pub fn evaluate(transcript: String, confidence: f64, expected: Option<&str>) -> Self {
        let pronunciation_score = pronunciation_score(&transcript, expected);
        let message = compose_message(&transcript, pronunciation_score, expected);
        Self {
            transcript,
            confidence,
            pronunciation_score,
            message,
        }
    }
}

/// Build the user-turn text for a scored transcript
#[must_use]
pub fn compose_message(transcript: &str, score: f64, expected: Option<&str>) -> String {
    match expected {
        Some(expected) if !expected.is_empty() && score < MISMATCH_THRESHOLD => format!(
            "{transcript} (I noticed some pronunciation differences. Did you mean \"{expected}\"?)"
        ),
        _ => transcript.to_string(),
    }
}

/// Recording state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

/// Continuous speech capture controller
pub struct SpeechCapture {
    shared: Arc<Shared>,
}

struct Shared {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: RecognitionConfig,
    silence_timeout: Duration,
    results: mpsc::UnboundedSender<PronunciationResult>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: CaptureState,
    processing: bool,
    final_pending: bool,
    last_activity: Instant,
    expected_text: Option<String>,
    silence_timer: Option<JoinHandle<()>>,
    timer_generation: u64,
}

impl Inner {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn cancel_silence_timer(&mut self) {
        self.timer_generation = self.timer_generation.wrapping_add(1);
        if let Some(timer) = self.silence_timer.take() {
            timer.abort();
        }
    }
}

impl SpeechCapture {
    /// Create a controller with the default listening mode and silence window
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> (Self, mpsc::UnboundedReceiver<PronunciationResult>) {
        Self::with_options(recognizer, RecognitionConfig::default(), SILENCE_TIMEOUT)
    }

    /// Create a controller with an explicit listening mode and silence window
    #[must_use]
    pub fn with_options(
        recognizer: Arc<dyn SpeechRecognizer>,
        config: RecognitionConfig,
        silence_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PronunciationResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            recognizer,
            config,
            silence_timeout,
            results: tx,
            inner: Mutex::new(Inner {
                state: CaptureState::Idle,
                processing: false,
                final_pending: false,
                last_activity: Instant::now(),
                expected_text: None,
                silence_timer: None,
                timer_generation: 0,
            }),
        });
        (Self { shared }, rx)
    }

    /// Set the utterance the speaker is expected to say
    pub fn set_expected_text(&self, expected: Option<String>) {
        self.shared.lock().expected_text = expected.filter(|e| !e.trim().is_empty());
    }

    /// Current recording state
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.shared.lock().state
    }

    /// Whether a session is open
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// Whether a final transcript is awaiting its turn to complete
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.shared.lock().processing
    }

    /// Whether `start` would open a session right now
    #[must_use]
    pub fn can_start(&self) -> bool {
        let inner = self.shared.lock();
        !inner.processing && inner.state == CaptureState::Idle
    }

    /// Open a recognition session
    ///
    /// Does nothing while processing or already recording. Engine start
    /// failures are logged and leave the controller idle.
    pub fn start(&self) {
        {
            let mut inner = self.shared.lock();
            if inner.processing {
                tracing::debug!("capture start ignored while processing");
                return;
            }
            if inner.state == CaptureState::Recording {
                return;
            }
            inner.state = CaptureState::Recording;
            inner.final_pending = false;
            inner.touch();
        }

        if let Err(e) = self.shared.recognizer.start(&self.shared.config) {
            tracing::error!(error = %e, "failed to start speech recognition");
            let mut inner = self.shared.lock();
            inner.state = CaptureState::Idle;
            inner.cancel_silence_timer();
            return;
        }

        tracing::debug!(language = %self.shared.config.language, "speech recognition started");
    }

    /// Close the session; safe to call when idle
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Re-enable capture for a fresh turn
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.processing = false;
        inner.final_pending = false;
    }

    /// Feed one engine event into the controller
    pub fn handle_event(&self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::SpeechStart => {
                let mut inner = self.shared.lock();
                inner.touch();
                inner.cancel_silence_timer();
            }
            RecognitionEvent::SpeechEnd => self.shared.arm_silence_timer(),
            RecognitionEvent::Result(result) => self.shared.on_result(&result),
            RecognitionEvent::Error { kind, message } => self.shared.on_error(&kind, message),
            RecognitionEvent::End => self.shared.on_end(),
        }
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop(&self) {
        let was_recording = {
            let mut inner = self.lock();
            inner.cancel_silence_timer();
            let was_recording = inner.state == CaptureState::Recording;
            inner.state = CaptureState::Idle;
            was_recording
        };

        if was_recording {
            match self.recognizer.stop() {
                Ok(()) => tracing::debug!("speech recognition stopped"),
                Err(e) => tracing::warn!(error = %e, "failed to stop speech recognition"),
            }
        }
    }

    fn on_result(self: &Arc<Self>, result: &RecognitionResult) {
        let finalized = {
            let mut inner = self.lock();
            inner.touch();
            inner.cancel_silence_timer();

            match result.best() {
                Some(best) if result.is_final => {
                    let evaluated = PronunciationResult::evaluate(
                        best.transcript.clone(),
                        best.confidence,
                        inner.expected_text.as_deref(),
                    );
                    inner.processing = true;
                    inner.final_pending = true;
                    Some(evaluated)
                }
                Some(best) => {
                    tracing::trace!(transcript = %best.transcript, "interim transcript");
                    None
                }
                None => None,
            }
        };

        if let Some(evaluated) = finalized {
            tracing::info!(
                transcript = %evaluated.transcript,
                confidence = evaluated.confidence,
                score = evaluated.pronunciation_score,
                "final transcript"
            );
            if self.results.send(evaluated).is_err() {
                tracing::debug!("capture result receiver dropped");
            }
        }

        self.arm_silence_timer();
    }

    fn on_error(&self, kind: &RecognitionErrorKind, message: Option<String>) {
        let detail = message.unwrap_or_default();
        match kind {
            RecognitionErrorKind::Aborted => {
                tracing::debug!(detail = %detail, "speech recognition aborted");
            }
            RecognitionErrorKind::NoSpeech => {
                tracing::info!(detail = %detail, "no speech detected");
            }
            RecognitionErrorKind::Network => {
                tracing::warn!(detail = %detail, "speech recognition network error");
            }
            RecognitionErrorKind::PermissionDenied => {
                tracing::error!(detail = %detail, "microphone permission denied");
            }
            RecognitionErrorKind::Other(code) => {
                tracing::warn!(code = %code, detail = %detail, "speech recognition error");
            }
        }

        let mut inner = self.lock();
        inner.cancel_silence_timer();
        inner.state = CaptureState::Idle;
        inner.processing = false;
    }

    fn on_end(&self) {
        let mut inner = self.lock();
        inner.cancel_silence_timer();
        inner.state = CaptureState::Idle;
        if !inner.final_pending {
            inner.processing = false;
        }
        tracing::debug!(processing = inner.processing, "speech recognition session ended");
    }

    /// Replace any pending watchdog with a fresh one
    fn arm_silence_timer(self: &Arc<Self>) {
        let mut inner = self.lock();
        inner.cancel_silence_timer();
        if inner.state != CaptureState::Recording {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, silence watchdog not armed");
            return;
        };

        let generation = inner.timer_generation;
        let timeout = self.silence_timeout;
        let shared: Weak<Self> = Arc::downgrade(self);
        inner.silence_timer = Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(shared) = shared.upgrade() {
                shared.on_silence_elapsed(generation);
            }
        }));
    }

    fn on_silence_elapsed(&self, generation: u64) {
        {
            let mut inner = self.lock();
            if inner.timer_generation != generation {
                return;
            }
            // the timer is finishing on its own; drop the handle instead of aborting it
            inner.silence_timer = None;
            if inner.state != CaptureState::Recording
                || inner.last_activity.elapsed() < self.silence_timeout
            {
                return;
            }
        }

        tracing::info!(
            timeout_secs = self.silence_timeout.as_secs(),
            "silence detected, stopping capture"
        );
        self.stop();
    }
}
