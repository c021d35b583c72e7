//! Speech synthesis engine boundary and a local command-line engine

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Speaking rate used for replies, slightly slower than normal for clarity
pub const DEFAULT_RATE: f32 = 0.9;

/// Neutral pitch
pub const DEFAULT_PITCH: f32 = 1.0;

/// Words per minute a speech command uses at rate 1.0
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Callback fired when an utterance finishes on its own
pub type OnDone = Box<dyn FnOnce() + Send + 'static>;

/// One request to speak a string
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speed multiplier, 1.0 is normal
    pub rate: f32,
    /// Pitch multiplier, 1.0 is neutral
    pub pitch: f32,
    /// BCP 47 language tag
    pub language: String,
}

impl Utterance {
    /// Create an utterance with the default rate, pitch, and language
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
            language: "en-US".to_string(),
        }
    }
}

/// A platform speech synthesis engine
pub trait SpeechSynthesizer: Send + Sync {
    /// Begin speaking; `on_end` fires only on natural completion
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot start
    fn speak(&self, utterance: Utterance, on_end: OnDone) -> Result<()>;

    /// Cancel whatever is playing; no-op when idle
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandFlavor {
    Espeak,
    Say,
}

/// Speaks through a local TTS program (`espeak-ng`, `espeak`, or macOS `say`)
pub struct CommandSynthesizer {
    program: PathBuf,
    flavor: CommandFlavor,
    active: Mutex<Option<oneshot::Sender<()>>>,
}

impl CommandSynthesizer {
    /// Programs probed by [`CommandSynthesizer::detect`], in order
    pub const CANDIDATES: [&'static str; 3] = ["espeak-ng", "espeak", "say"];

    /// Use a specific speech program
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let flavor = flavor_of(&program);
        Self {
            program,
            flavor,
            active: Mutex::new(None),
        }
    }

    /// Find the first available speech program on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if none of the candidates is installed
    pub fn detect() -> Result<Self> {
        Self::CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
            .ok_or_else(|| {
                Error::Config(format!(
                    "no speech program found (tried {})",
                    Self::CANDIDATES.join(", ")
                ))
            })
    }

    /// Path of the speech program
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for an utterance; the text goes over stdin
    fn args(&self, utterance: &Utterance) -> Vec<String> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let wpm = (BASE_WORDS_PER_MINUTE * utterance.rate).round().max(1.0) as u32;

        match self.flavor {
            CommandFlavor::Espeak => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
                vec![
                    "-s".to_string(),
                    wpm.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "-v".to_string(),
                    utterance.language.to_lowercase(),
                    "--stdin".to_string(),
                ]
            }
            CommandFlavor::Say => vec![
                "-r".to_string(),
                wpm.to_string(),
                "-f".to_string(),
                "-".to_string(),
            ],
        }
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn flavor_of(program: &Path) -> CommandFlavor {
    match program.file_stem().and_then(|s| s.to_str()) {
        Some("say") => CommandFlavor::Say,
        _ => CommandFlavor::Espeak,
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, utterance: Utterance, on_end: OnDone) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Synthesis(format!("no async runtime: {e}")))?;
        let _guard = runtime.enter();

        let mut child = tokio::process::Command::new(&self.program)
            .args(self.args(&utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Synthesis(format!("failed to run {}: {e}", self.program.display())))?;

        let mut stdin = child.stdin.take();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        // at most one child speaks at a time
        if let Some(previous) = self.active().replace(cancel_tx) {
            let _ = previous.send(());
        }

        let text = utterance.text;
        runtime.spawn(async move {
            if let Some(mut pipe) = stdin.take() {
                if let Err(e) = pipe.write_all(text.as_bytes()).await {
                    tracing::warn!(error = %e, "failed to write to speech program");
                }
            }

            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => on_end(),
                    Ok(status) => tracing::warn!(%status, "speech program exited with failure"),
                    Err(e) => tracing::warn!(error = %e, "failed waiting for speech program"),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "speech program already gone");
                    }
                }
            }
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Some(active) = self.active().take() {
            let _ = active.send(());
        }
    }
}

/// Engine for machines without a speech program; utterances finish at once
#[derive(Debug, Default)]
pub struct SilentSynthesizer;

impl SpeechSynthesizer for SilentSynthesizer {
    fn speak(&self, utterance: Utterance, on_end: OnDone) -> Result<()> {
        tracing::trace!(chars = utterance.text.len(), "silent playback");
        on_end();
        Ok(())
    }

    fn cancel(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_defaults_are_slow_and_neutral() {
        let utterance = Utterance::new("hello");
        assert!((utterance.rate - 0.9).abs() < f32::EPSILON);
        assert!((utterance.pitch - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn espeak_arguments() {
        let synth = CommandSynthesizer::new("/usr/bin/espeak-ng");
        let utterance = Utterance {
            rate: 1.0,
            ..Utterance::new("hello")
        };
        let args = synth.args(&utterance);
        assert_eq!(args, ["-s", "175", "-p", "50", "-v", "en-us", "--stdin"]);
    }

    #[test]
    fn say_arguments() {
        let synth = CommandSynthesizer::new("/usr/bin/say");
        let utterance = Utterance {
            rate: 2.0,
            ..Utterance::new("hello")
        };
        let args = synth.args(&utterance);
        assert_eq!(args, ["-r", "350", "-f", "-"]);
    }

    #[test]
    fn cancel_when_idle_is_harmless() {
        let synth = CommandSynthesizer::new("espeak");
        synth.cancel();
        synth.cancel();
    }

    #[test]
    fn silent_engine_completes_immediately() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        SilentSynthesizer
            .speak(Utterance::new("hi"), Box::new(move || flag.store(true, Ordering::SeqCst)))
            .unwrap();
        assert!(done.load(Ordering::SeqCst));
    }
}
