//! TOML configuration file loading
//!
//! Supports `~/.config/talkback/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TalkbackConfigFile {
    /// Relay server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Model API configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Front-end client configuration
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Speech capture and playback configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Directory of static web UI files
    pub static_dir: Option<PathBuf>,
}

/// Model API configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// API key for the completion endpoint
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,
}

/// Front-end client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Base URL of the relay server
    pub base_url: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// BCP 47 language tag for recognition and synthesis
    pub language: Option<String>,

    /// Speech program used for playback
    pub tts_command: Option<PathBuf>,

    /// Seconds of silence that end a recording session
    pub silence_timeout_secs: Option<u64>,
}

/// Parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<TalkbackConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file from the standard path
///
/// Returns `TalkbackConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> TalkbackConfigFile {
    let Some(path) = config_file_path() else {
        return TalkbackConfigFile::default();
    };

    if !path.exists() {
        return TalkbackConfigFile::default();
    }

    read_config_file(&path).unwrap_or_else(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "failed to load config file, using defaults"
        );
        TalkbackConfigFile::default()
    })
}

/// Return the config file path: `~/.config/talkback/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("talkback").join("config.toml"))
}
