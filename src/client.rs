//! HTTP client for the talkback relay
//!
//! Used by front ends to send a turn to `/api/chat` and to fetch
//! pronunciation feedback from `/api/transcribe`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ClientConfig;
use crate::error::UNKNOWN_ERROR;
use crate::message::{ConversationContext, Message};
use crate::voice::PronunciationResult;
use crate::{Error, Result};

/// Something that can answer a user turn
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `message` with prior `context` and return the assistant reply
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be obtained
    async fn send_message(&self, message: &str, context: &ConversationContext) -> Result<Message>;
}

/// Client for a running relay server
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ChatClient {
    /// Create a client for `base_url`
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no base URL is configured
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(config.require_base_url()?))
    }

    /// Base URL requests are sent to
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn request_reply(&self, message: &str, context: &ConversationContext) -> Result<Message> {
        #[derive(Serialize)]
        struct ChatBody<'a> {
            message: &'a str,
            context: &'a ConversationContext,
        }

        #[derive(Deserialize)]
        struct ChatReply {
            content: Option<String>,
        }

        let response = self
            .http
            .post(self.endpoint("api/chat")?)
            .json(&ChatBody { message, context })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = error_field(&body);
            tracing::error!(status = status.as_u16(), error = %reason, "chat API error");
            return Err(Error::Api {
                status: status.as_u16(),
                message: reason,
            });
        }

        let reply: ChatReply = response.json().await?;
        let content = reply
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| Error::EmptyResponse("Received empty response from API".to_string()))?;

        Ok(Message::assistant(content))
    }

    /// Ask the relay to grade a pronunciation result
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-2xx status, or a response
    /// without feedback
    pub async fn pronunciation_feedback(&self, result: &PronunciationResult) -> Result<String> {
        #[derive(Deserialize)]
        struct TranscribeReply {
            #[serde(default)]
            result: serde_json::Map<String, serde_json::Value>,
        }

        let response = self
            .http
            .post(self.endpoint("api/transcribe")?)
            .json(result)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_field(&body),
            });
        }

        let reply: TranscribeReply = response.json().await?;
        reply
            .result
            .get("feedback")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| Error::EmptyResponse("Received empty feedback from API".to_string()))
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn send_message(&self, message: &str, context: &ConversationContext) -> Result<Message> {
        self.request_reply(message, context).await.map_err(|e| {
            tracing::error!(error = %e, "error in send_message");
            Error::SendMessage(Box::new(e))
        })
    }
}

/// Extract the `error` string of a JSON error body
fn error_field(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(serde_json::Value::as_str).map(ToString::to_string))
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}
