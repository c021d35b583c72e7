//! Voice processing module
//!
//! Speech capture (recognition, silence watchdog, pronunciation scoring)
//! and speech playback. Platform engines plug in through
//! [`SpeechRecognizer`] and [`SpeechSynthesizer`].

mod capture;
mod dictation;
mod player;
mod recognition;
mod similarity;
mod synthesis;

pub use capture::{
    CaptureState, MISMATCH_THRESHOLD, PronunciationResult, SILENCE_TIMEOUT, SpeechCapture,
    compose_message,
};
pub use dictation::DictationRecognizer;
pub use player::TtsPlayer;
pub use recognition::{
    Alternative, RecognitionConfig, RecognitionErrorKind, RecognitionEvent, RecognitionResult,
    SpeechRecognizer,
};
pub use similarity::pronunciation_score;
pub use synthesis::{
    CommandSynthesizer, DEFAULT_PITCH, DEFAULT_RATE, OnDone, SilentSynthesizer, SpeechSynthesizer,
    Utterance,
};
