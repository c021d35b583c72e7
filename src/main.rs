use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use talkback::api::ApiServerBuilder;
use talkback::config::VoiceConfig;
use talkback::voice::{
    CommandSynthesizer, DictationRecognizer, PronunciationResult, RecognitionConfig,
    SilentSynthesizer, SpeechCapture, SpeechSynthesizer, TtsPlayer,
};
use talkback::{
    ChatClient, ChatRelay, Config, Conversation, InputSource, Message, TurnOutcome, TurnState,
    pronunciation_feedback,
};

/// Talkback - Conversational English practice with pronunciation scoring
#[derive(Parser)]
#[command(name = "talkback", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "TALKBACK_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server (default)
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Practice in the terminal against a running server
    Chat,
    /// Score a transcript against an expected phrase
    Score {
        /// What was heard
        transcript: String,
        /// What the speaker meant to say
        #[arg(short, long)]
        expected: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,talkback=info",
        1 => "info,talkback=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Serve { port: None });

    // scoring is offline and needs no configuration
    if let Command::Score {
        transcript,
        expected,
    } = command
    {
        cmd_score(&transcript, expected.as_deref());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    if let Command::Serve { port } = command {
        cmd_serve(config, port).await
    } else {
        cmd_chat(config).await
    }
}

/// Run the relay server until it fails
async fn cmd_serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let relay = ChatRelay::from_config(&config.llm)?;
    let port = port.unwrap_or(config.server.port);

    tracing::info!(port, model = relay.model(), "starting talkback server");

    ApiServerBuilder::new(relay, port)
        .static_dir(config.server.static_dir)
        .build()
        .run()
        .await?;

    Ok(())
}

/// Print the score and feedback for one transcript
fn cmd_score(transcript: &str, expected: Option<&str>) {
    let result = PronunciationResult::evaluate(transcript.to_string(), 1.0, expected);

    println!("score:    {:.2}", result.pronunciation_score);
    println!("feedback: {}", pronunciation_feedback(result.pronunciation_score));
    if result.message != result.transcript {
        println!("message:  {}", result.message);
    }
}

/// A line typed at the chat prompt
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Text(&'a str),
    Say(&'a str),
    Replay,
    Stop,
    Reset,
    Quit,
    Unknown(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(command) = line.strip_prefix('/') else {
            return Self::Text(line);
        };
        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        match name {
            "say" => Self::Say(rest.trim()),
            "replay" => Self::Replay,
            "stop" => Self::Stop,
            "reset" => Self::Reset,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other),
        }
    }
}

fn synthesizer(voice: &VoiceConfig) -> Arc<dyn SpeechSynthesizer> {
    let detected = match &voice.tts_command {
        Some(program) => Ok(CommandSynthesizer::new(program)),
        None => CommandSynthesizer::detect(),
    };
    match detected {
        Ok(synth) => {
            tracing::debug!(program = %synth.program().display(), "using speech program");
            Arc::new(synth)
        }
        Err(e) => {
            tracing::warn!(error = %e, "replies will not be spoken");
            Arc::new(SilentSynthesizer)
        }
    }
}

fn print_reply(message: &Message) {
    println!("assistant: {}", message.content);
}

/// Terminal conversation against a running relay server
#[allow(clippy::too_many_lines)]
async fn cmd_chat(config: Config) -> anyhow::Result<()> {
    let client = Arc::new(ChatClient::from_config(&config.client)?);
    let player = TtsPlayer::with_language(synthesizer(&config.voice), config.voice.language.clone());
    let mut conversation = Conversation::new(client.clone(), player);

    let (recognizer, mut engine_events) = DictationRecognizer::new();
    let recognizer = Arc::new(recognizer);
    let recognition = RecognitionConfig {
        language: config.voice.language.clone(),
        ..RecognitionConfig::default()
    };
    let (capture, mut captured) = SpeechCapture::with_options(
        recognizer.clone(),
        recognition,
        config.voice.silence_timeout,
    );

    let (reply_tx, mut replies) = mpsc::unbounded_channel::<talkback::Result<Message>>();
    let (feedback_tx, mut feedback) = mpsc::unbounded_channel::<String>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!(server = %client.base_url(), "starting conversation");
    println!("Type to chat, /say <text> to speak, /replay, /stop, /reset, /quit");

    conversation.greet();
    if let Some(greeting) = conversation.messages().last() {
        print_reply(greeting);
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match ChatCommand::parse(&line) {
                    ChatCommand::Quit => break,
                    ChatCommand::Text("") => {}
                    ChatCommand::Text(text) => {
                        match conversation.begin_turn(text, InputSource::Typed) {
                            Some(turn) => {
                                let backend = conversation.backend();
                                let tx = reply_tx.clone();
                                tokio::spawn(async move {
                                    let reply = backend.send_message(&turn.message, &turn.context).await;
                                    let _ = tx.send(reply);
                                });
                            }
                            None if conversation.state() == TurnState::Sending => {
                                println!("(still waiting for the last reply)");
                            }
                            None => {}
                        }
                    }
                    ChatCommand::Say("") => println!("usage: /say <text>"),
                    ChatCommand::Say(text) => {
                        if !conversation.recording_enabled() || !capture.can_start() {
                            println!("(voice input is paused until the reply arrives)");
                            continue;
                        }
                        capture.set_expected_text(conversation.expected_text().map(ToString::to_string));
                        capture.start();
                        if let Err(e) = recognizer.dictate(text) {
                            tracing::warn!(error = %e, "dictation failed");
                        }
                    }
                    ChatCommand::Replay => conversation.replay_last(),
                    ChatCommand::Stop => {
                        conversation.stop_speaking();
                        capture.stop();
                    }
                    ChatCommand::Reset => {
                        conversation.stop_speaking();
                        capture.stop();
                        capture.reset();
                        conversation.reset();
                        println!("(conversation cleared)");
                    }
                    ChatCommand::Unknown(name) => println!("unknown command /{name}"),
                }
            }
            Some(event) = engine_events.recv() => capture.handle_event(event),
            Some(result) = captured.recv() => {
                println!(
                    "you said: {} (confidence {:.2}, pronunciation {:.2})",
                    result.transcript, result.confidence, result.pronunciation_score
                );
                let Some(turn) = conversation.begin_turn(&result.message, InputSource::Voice) else {
                    continue;
                };
                capture.stop();

                let backend = conversation.backend();
                let tx = reply_tx.clone();
                tokio::spawn(async move {
                    let reply = backend.send_message(&turn.message, &turn.context).await;
                    let _ = tx.send(reply);
                });

                let client = client.clone();
                let tx = feedback_tx.clone();
                tokio::spawn(async move {
                    match client.pronunciation_feedback(&result).await {
                        Ok(line) => {
                            let _ = tx.send(line);
                        }
                        Err(e) => tracing::warn!(error = %e, "pronunciation feedback unavailable"),
                    }
                });
            }
            Some(line) = feedback.recv() => println!("feedback: {line}"),
            Some(reply) = replies.recv() => {
                match conversation.complete_turn(reply) {
                    TurnOutcome::Replied(message) => print_reply(&message),
                    TurnOutcome::Failed(reason) => println!("error: {reason}"),
                    TurnOutcome::Ignored => {}
                }
                if conversation.recording_enabled() {
                    capture.reset();
                }
            }
        }
    }

    conversation.stop_speaking();
    capture.stop();
    Ok(())
}
