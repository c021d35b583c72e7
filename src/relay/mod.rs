//! Chat relay to a hosted language model
//!
//! Fans the dialogue history into a fixed system instruction, the prior
//! turns, and the new user turn, then calls an OpenAI-compatible
//! chat-completions endpoint with fixed sampling parameters.

mod prompt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::message::{ConversationContext, Role};
use crate::{Error, Result};

pub use prompt::SYSTEM_PROMPT;

/// Sampling temperature
pub const TEMPERATURE: f32 = 0.9;

/// Nucleus sampling mass
pub const TOP_P: f32 = 1.0;

/// Maximum tokens in a reply
pub const MAX_TOKENS: u32 = 1000;

/// Client for the upstream completion API
#[derive(Debug)]
pub struct ChatRelay {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
}

impl ChatRelay {
    /// Create a relay for `base_url` (e.g. `https://api.groq.com/openai/v1`)
    #[must_use]
    pub fn new(api_key: SecretString, base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
        }
    }

    /// Create a relay from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is set
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(
            SecretString::from(api_key.expose_secret().to_owned()),
            &config.base_url,
            config.model.clone(),
        ))
    }

    /// Model identifier requests are sent to
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the message list sent upstream
    #[must_use]
    pub fn build_messages<'a>(
        message: &'a str,
        context: &'a ConversationContext,
    ) -> Vec<ChatMessage<'a>> {
        let mut messages = Vec::with_capacity(context.messages.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT,
        });
        messages.extend(context.messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));
        messages.push(ChatMessage {
            role: Role::User.as_str(),
            content: message,
        });
        messages
    }

    /// Ask the model for the next assistant turn
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-2xx upstream status, or an
    /// empty completion
    pub async fn complete(&self, message: &str, context: &ConversationContext) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages: Self::build_messages(message, context),
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(
            model = %self.model,
            history = context.messages.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: upstream_error_message(&body),
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty());

        content.ok_or_else(|| {
            tracing::error!(model = %self.model, "empty completion from model");
            Error::EmptyResponse("Failed to generate response".to_string())
        })
    }
}

/// Pull a readable reason out of an upstream error body
fn upstream_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Object { message: String },
        Text(String),
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorDetail::Object { message } | ErrorDetail::Text(message),
        }) => message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => crate::error::UNKNOWN_ERROR.to_string(),
    }
}

/// One entry in the upstream message list
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
