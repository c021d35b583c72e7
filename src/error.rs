//! Error types for talkback

use thiserror::Error;

/// Result type alias for talkback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fallback reason when a failure carries no usable description
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Errors that can occur in talkback
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing base URL, credential, bad value)
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-2xx response from a talkback or model endpoint
    #[error("API responded with status {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error text reported by the endpoint
        message: String,
    },

    /// Well-formed response without usable content
    #[error("{0}")]
    EmptyResponse(String),

    /// Chat call failed on the client side
    #[error("SendMessage error: {0}")]
    SendMessage(Box<Error>),

    /// Speech recognition engine error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Whether this error came from missing or invalid configuration
    #[must_use]
    pub fn is_config(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::SendMessage(inner) => inner.is_config(),
            _ => false,
        }
    }
}
