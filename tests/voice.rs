//! Voice pipeline tests: capture controller, silence watchdog, and playback

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use talkback::voice::{
    CaptureState, DictationRecognizer, RecognitionErrorKind, RecognitionEvent, RecognitionResult,
    SpeechCapture, TtsPlayer, DEFAULT_PITCH, DEFAULT_RATE,
};

mod common;
use common::{RecordingSynthesizer, ScriptedRecognizer};

fn recording_capture() -> (
    Arc<ScriptedRecognizer>,
    SpeechCapture,
    tokio::sync::mpsc::UnboundedReceiver<talkback::voice::PronunciationResult>,
) {
    let recognizer = Arc::new(ScriptedRecognizer::default());
    let (capture, results) = SpeechCapture::new(recognizer.clone());
    capture.start();
    (recognizer, capture, results)
}

fn final_result(transcript: &str, confidence: f64) -> RecognitionEvent {
    RecognitionEvent::Result(RecognitionResult::finalized(transcript, confidence))
}

#[tokio::test]
async fn test_close_match_submits_raw_transcript() {
    let (_recognizer, capture, mut results) = recording_capture();
    capture.set_expected_text(Some("hello word".to_string()));

    capture.handle_event(final_result("hello world", 0.93));

    let result = results.try_recv().unwrap();
    assert_eq!(result.transcript, "hello world");
    assert!((result.confidence - 0.93).abs() < f64::EPSILON);
    assert!(result.pronunciation_score >= 0.6);
    assert_eq!(result.message, "hello world");
}

#[tokio::test]
async fn test_mismatch_quotes_expected_text() {
    let (_recognizer, capture, mut results) = recording_capture();
    capture.set_expected_text(Some("goodbye".to_string()));

    capture.handle_event(final_result("hello world", 0.8));

    let result = results.try_recv().unwrap();
    assert!(result.pronunciation_score < 0.6);
    assert!(result.message.starts_with("hello world (I noticed"));
    assert!(result.message.contains("\"goodbye\""));
}

#[tokio::test]
async fn test_interim_results_are_not_emitted() {
    let (_recognizer, capture, mut results) = recording_capture();

    capture.handle_event(RecognitionEvent::Result(RecognitionResult::interim("hello")));

    assert!(results.try_recv().is_err());
    assert!(!capture.is_processing());
    assert!(capture.is_recording());
}

#[tokio::test(start_paused = true)]
async fn test_silence_stops_recording() {
    let (recognizer, capture, _results) = recording_capture();

    capture.handle_event(RecognitionEvent::SpeechStart);
    capture.handle_event(RecognitionEvent::SpeechEnd);

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert!(capture.is_recording());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(capture.state(), CaptureState::Idle);
    assert_eq!(recognizer.count("stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activity_postpones_silence_stop() {
    let (recognizer, capture, _results) = recording_capture();

    capture.handle_event(RecognitionEvent::SpeechEnd);
    tokio::time::sleep(Duration::from_secs(3)).await;

    capture.handle_event(RecognitionEvent::SpeechStart);
    capture.handle_event(RecognitionEvent::Result(RecognitionResult::interim("so")));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(capture.is_recording(), "watchdog fired despite newer activity");

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(!capture.is_recording());
    assert_eq!(recognizer.count("stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_final_result_arms_watchdog() {
    let (recognizer, capture, mut results) = recording_capture();

    capture.handle_event(final_result("hello there", 0.9));
    assert!(results.try_recv().is_ok());

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert!(capture.is_recording());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(capture.state(), CaptureState::Idle);
    assert_eq!(recognizer.count("stop"), 1);
    assert!(capture.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_speech_start_cancels_watchdog() {
    let (_recognizer, capture, _results) = recording_capture();

    capture.handle_event(RecognitionEvent::SpeechEnd);
    capture.handle_event(RecognitionEvent::SpeechStart);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(capture.is_recording());
}

#[tokio::test]
async fn test_stop_while_idle_is_harmless() {
    let recognizer = Arc::new(ScriptedRecognizer::default());
    let (capture, _results) = SpeechCapture::new(recognizer.clone());

    capture.stop();
    capture.stop();

    assert_eq!(capture.state(), CaptureState::Idle);
    assert!(recognizer.calls().is_empty());
}

#[tokio::test]
async fn test_start_while_processing_is_noop() {
    let (recognizer, capture, mut results) = recording_capture();

    capture.handle_event(final_result("hello", 0.9));
    assert!(results.try_recv().is_ok());
    assert!(capture.is_processing());

    capture.stop();
    capture.handle_event(RecognitionEvent::End);
    assert!(capture.is_processing(), "end of session cleared a pending final result");

    capture.start();
    assert!(!capture.is_recording());
    assert_eq!(recognizer.count("start"), 1);

    capture.reset();
    assert!(capture.can_start());
    capture.start();
    assert!(capture.is_recording());
    assert_eq!(recognizer.count("start"), 2);
}

#[tokio::test]
async fn test_end_without_final_result_clears_processing() {
    let (_recognizer, capture, _results) = recording_capture();

    capture.handle_event(RecognitionEvent::End);

    assert_eq!(capture.state(), CaptureState::Idle);
    assert!(capture.can_start());
}

#[tokio::test]
async fn test_engine_error_forces_idle() {
    let kinds = [
        RecognitionErrorKind::Aborted,
        RecognitionErrorKind::NoSpeech,
        RecognitionErrorKind::Network,
        RecognitionErrorKind::PermissionDenied,
        RecognitionErrorKind::from_code("audio-capture"),
    ];

    for kind in kinds {
        let (_recognizer, capture, _results) = recording_capture();
        capture.handle_event(final_result("hi", 0.7));
        assert!(capture.is_processing());

        capture.handle_event(RecognitionEvent::Error {
            kind,
            message: Some("engine detail".to_string()),
        });

        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(!capture.is_processing());
    }
}

#[tokio::test]
async fn test_start_failure_reverts_to_idle() {
    let recognizer = Arc::new(ScriptedRecognizer::failing());
    let (capture, _results) = SpeechCapture::new(recognizer.clone());

    capture.start();

    assert_eq!(capture.state(), CaptureState::Idle);
    assert_eq!(recognizer.calls(), ["start"]);
    assert!(capture.can_start());
}

#[tokio::test]
async fn test_drop_stops_active_engine() {
    let (recognizer, capture, _results) = recording_capture();

    drop(capture);

    assert_eq!(recognizer.calls(), ["start", "stop"]);
}

#[tokio::test]
async fn test_dictation_drives_capture() {
    let (recognizer, mut events) = DictationRecognizer::new();
    let recognizer = Arc::new(recognizer);
    let (capture, mut results) = SpeechCapture::new(recognizer.clone());
    capture.set_expected_text(Some("How are you today?".to_string()));

    capture.start();
    recognizer.dictate("how are you today").unwrap();
    while let Ok(event) = events.try_recv() {
        capture.handle_event(event);
    }

    let result = results.try_recv().unwrap();
    assert_eq!(result.transcript, "how are you today");
    assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    assert_eq!(result.message, "how are you today");

    capture.stop();
    assert!(!recognizer.is_listening());
    assert_eq!(events.try_recv().unwrap(), RecognitionEvent::End);
}

#[tokio::test]
async fn test_speak_preempts_previous_utterance() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let player = TtsPlayer::new(synth.clone());
    let first_done = Arc::new(AtomicUsize::new(0));
    let second_done = Arc::new(AtomicUsize::new(0));

    let counter = first_done.clone();
    player
        .speak("first", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    let counter = second_done.clone();
    player
        .speak("second", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(synth.spoken(), ["first", "second"]);
    assert!(synth.cancels() >= 2);
    assert!(player.is_speaking());

    synth.finish_all();

    assert_eq!(first_done.load(Ordering::SeqCst), 0);
    assert_eq!(second_done.load(Ordering::SeqCst), 1);
    assert!(!player.is_speaking());
}

#[tokio::test]
async fn test_utterance_uses_reply_voice() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let player = TtsPlayer::with_language(synth.clone(), "en-GB");

    player.speak("Lovely weather", || {}).unwrap();

    let utterance = synth.last_utterance().unwrap();
    assert!((utterance.rate - DEFAULT_RATE).abs() < f32::EPSILON);
    assert!((utterance.pitch - DEFAULT_PITCH).abs() < f32::EPSILON);
    assert_eq!(utterance.language, "en-GB");
}

#[tokio::test]
async fn test_stop_suppresses_completion() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let player = TtsPlayer::new(synth.clone());
    let done = Arc::new(AtomicUsize::new(0));

    player.stop();

    let counter = done.clone();
    player
        .speak("hello", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    player.stop();
    synth.finish_all();

    assert!(!player.is_speaking());
    assert_eq!(done.load(Ordering::SeqCst), 0);
}
