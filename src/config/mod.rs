//! Configuration management for talkback
//!
//! Precedence is env > TOML file > default. Values that only one call path
//! needs (the model credential for the relay, the base URL for the client)
//! are optional here and checked by that path through the `require_*`
//! accessors.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::voice::SILENCE_TIMEOUT;
use crate::{Error, Result};
use file::TalkbackConfigFile;

/// Default relay port
pub const DEFAULT_PORT: u16 = 3000;

/// Default OpenAI-compatible API base (Groq)
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default completion model
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Talkback configuration
#[derive(Debug)]
pub struct Config {
    /// Relay server configuration
    pub server: ServerConfig,

    /// Model API configuration
    pub llm: LlmConfig,

    /// Front-end client configuration
    pub client: ClientConfig,

    /// Speech configuration
    pub voice: VoiceConfig,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,
}

/// Model API configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// API key (from `GROQ_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Model identifier
    pub model: String,
}

/// Front-end client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Base URL of the relay server (from `TALKBACK_BASE_URL`)
    pub base_url: Option<String>,
}

/// Speech configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// BCP 47 language tag
    pub language: String,

    /// Speech program for playback; auto-detected when unset
    pub tts_command: Option<PathBuf>,

    /// Silence that ends a recording session
    pub silence_timeout: Duration,
}

impl Config {
    /// Load configuration from the environment and an optional TOML file
    ///
    /// With `path` set the file must exist and parse; otherwise the
    /// standard location is used when present.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be read or a value is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a numeric value is malformed
    pub fn from_sources<F>(fc: TalkbackConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match env("TALKBACK_PORT").or_else(|| env("PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid port {raw:?}: {e}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let server = ServerConfig {
            port,
            static_dir: env("TALKBACK_STATIC_DIR")
                .map(PathBuf::from)
                .or(fc.server.static_dir),
        };

        let llm = LlmConfig {
            api_key: env("GROQ_API_KEY")
                .or(fc.llm.api_key)
                .map(SecretString::from),
            base_url: env("TALKBACK_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: env("TALKBACK_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        };

        let client = ClientConfig {
            base_url: env("TALKBACK_BASE_URL").or(fc.client.base_url),
        };

        let silence_timeout = match env("TALKBACK_SILENCE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|e| {
                Error::Config(format!("invalid silence timeout {raw:?}: {e}"))
            })?),
            None => fc
                .voice
                .silence_timeout_secs
                .map_or(SILENCE_TIMEOUT, Duration::from_secs),
        };

        let voice = VoiceConfig {
            language: env("TALKBACK_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or_else(|| "en-US".to_string()),
            tts_command: env("TALKBACK_TTS_COMMAND")
                .map(PathBuf::from)
                .or(fc.voice.tts_command),
            silence_timeout,
        };

        Ok(Self {
            server,
            llm,
            client,
            voice,
        })
    }
}

impl LlmConfig {
    /// The model credential, required by the relay
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no key is set
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.api_key
            .as_ref()
            .ok_or_else(|| Error::Config("GROQ_API_KEY is not set".to_string()))
    }
}

impl ClientConfig {
    /// The relay base URL, required by the client
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is unset or malformed
    pub fn require_base_url(&self) -> Result<Url> {
        let raw = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("TALKBACK_BASE_URL is not set".to_string()))?;
        Url::parse(raw).map_err(|e| Error::Config(format!("invalid TALKBACK_BASE_URL {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_with(vars: &[(&str, &str)], fc: TalkbackConfigFile) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_sources(fc, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_with(&[], TalkbackConfigFile::default()).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.voice.silence_timeout, Duration::from_secs(5));
        assert_eq!(config.voice.language, "en-US");
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = TalkbackConfigFile::default();
        fc.server.port = Some(4000);
        fc.llm.model = Some("file-model".to_string());

        let config = config_with(
            &[("TALKBACK_PORT", "5000"), ("GROQ_API_KEY", "gsk_test")],
            fc,
        )
        .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.llm.model, "file-model");
        assert_eq!(
            config.llm.require_api_key().unwrap().expose_secret(),
            "gsk_test"
        );
    }

    #[test]
    fn missing_credential_is_config_error() {
        let config = config_with(&[], TalkbackConfigFile::default()).unwrap();
        let err = config.llm.require_api_key().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn missing_base_url_is_config_error() {
        let config = config_with(&[], TalkbackConfigFile::default()).unwrap();
        let err = config.client.require_base_url().unwrap_err();
        assert!(err.to_string().contains("TALKBACK_BASE_URL"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = config_with(&[("TALKBACK_BASE_URL", "  ")], TalkbackConfigFile::default()).unwrap();
        assert!(config.client.base_url.is_none());
    }

    #[test]
    fn malformed_port_rejected() {
        let err = config_with(&[("PORT", "eighty")], TalkbackConfigFile::default()).unwrap_err();
        assert!(err.is_config());
    }
}
