//! Speech recognition engine boundary
//!
//! The capture controller drives an engine through [`SpeechRecognizer`] and
//! receives everything the engine reports as [`RecognitionEvent`]s pushed
//! into [`SpeechCapture::handle_event`](super::SpeechCapture::handle_event).

use crate::Result;

/// Listening mode requested from the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Keep listening across pauses instead of ending after one phrase
    pub continuous: bool,
    /// Report partial hypotheses before they are final
    pub interim_results: bool,
    /// BCP 47 language tag
    pub language: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: "en-US".to_string(),
        }
    }
}

/// A platform speech recognition engine
pub trait SpeechRecognizer: Send + Sync {
    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns error if the engine refuses to start (busy, no device)
    fn start(&self, config: &RecognitionConfig) -> Result<()>;

    /// Stop listening; the engine is expected to follow with [`RecognitionEvent::End`]
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to stop cleanly
    fn stop(&self) -> Result<()>;
}

/// One hypothesis for a recognized phrase
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    /// Engine confidence in [0, 1]
    pub confidence: f64,
}

/// A recognition result, interim or final
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Hypotheses ordered best first
    pub alternatives: Vec<Alternative>,
    /// Final results are no longer subject to revision
    pub is_final: bool,
}

impl RecognitionResult {
    /// Build a single-hypothesis interim result
    #[must_use]
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            alternatives: vec![Alternative {
                transcript: transcript.into(),
                confidence: 0.0,
            }],
            is_final: false,
        }
    }

    /// Build a single-hypothesis final result
    #[must_use]
    pub fn finalized(transcript: impl Into<String>, confidence: f64) -> Self {
        Self {
            alternatives: vec![Alternative {
                transcript: transcript.into(),
                confidence,
            }],
            is_final: true,
        }
    }

    /// Best hypothesis, if the engine produced any
    #[must_use]
    pub fn best(&self) -> Option<&Alternative> {
        self.alternatives.first()
    }
}

/// Failure classes reported by recognition engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Listening was aborted by the user agent or the app
    Aborted,
    /// No speech was detected
    NoSpeech,
    /// Network communication failed
    Network,
    /// Microphone or service permission was denied
    PermissionDenied,
    /// Anything else, with the engine's code
    Other(String),
}

impl RecognitionErrorKind {
    /// Classify a Web Speech style error code
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "aborted" => Self::Aborted,
            "no-speech" => Self::NoSpeech,
            "network" => Self::Network,
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted => f.write_str("aborted"),
            Self::NoSpeech => f.write_str("no-speech"),
            Self::Network => f.write_str("network"),
            Self::PermissionDenied => f.write_str("not-allowed"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

/// Events a recognition engine reports while a session is open
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The engine heard speech begin
    SpeechStart,
    /// The engine heard speech stop
    SpeechEnd,
    /// A new interim or final result
    Result(RecognitionResult),
    /// The session failed
    Error {
        kind: RecognitionErrorKind,
        message: Option<String>,
    },
    /// The session ended, for whatever reason
    End,
}
