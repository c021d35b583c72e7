//! Chat endpoint relaying a turn to the model

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::message::ConversationContext;
use crate::Error;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

/// Chat request body
#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: ConversationContext,
}

/// Chat response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

/// Relay one user turn plus history to the model
async fn chat(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let Json(request) = payload.map_err(|e| ChatError::InvalidBody(e.body_text()))?;

    if request.message.is_empty() {
        return Err(ChatError::MissingMessage);
    }

    let content = state
        .relay
        .complete(&request.message, &request.context)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chat completion failed");
            ChatError::from(e)
        })?;

    Ok(Json(ChatResponse { content }))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    MissingMessage,
    InvalidBody(String),
    EmptyCompletion,
    Upstream(String),
}

impl From<Error> for ChatError {
    fn from(e: Error) -> Self {
        match e {
            Error::EmptyResponse(_) => Self::EmptyCompletion,
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let (status, error) = match self {
            Self::MissingMessage => (StatusCode::BAD_REQUEST, "Message is required".to_string()),
            Self::InvalidBody(reason) => (StatusCode::BAD_REQUEST, format!("Invalid request: {reason}")),
            Self::EmptyCompletion => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate response".to_string(),
            ),
            Self::Upstream(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Chat API error: {reason}"),
            ),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
