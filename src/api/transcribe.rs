//! Pronunciation feedback endpoint
//!
//! Accepts either a pronunciation result computed by the client or a raw
//! `{ audio: <base64> }` payload, and echoes it back with a feedback line.
//! No speech processing happens server side; a payload without a score is
//! graded as a zero score.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feedback::pronunciation_feedback;

/// Build transcribe router
pub fn router() -> Router {
    Router::new().route("/transcribe", post(transcribe))
}

/// Successful transcribe response
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub success: bool,
    /// The submitted payload with a `feedback` field added
    pub result: Map<String, Value>,
}

async fn transcribe(body: Bytes) -> Result<Json<TranscribeResponse>, TranscribeError> {
    let result = annotate(&body).map_err(|reason| {
        tracing::error!(reason, "transcription error");
        TranscribeError
    })?;

    Ok(Json(TranscribeResponse {
        success: true,
        result,
    }))
}

/// Attach feedback to a submitted payload
fn annotate(body: &[u8]) -> Result<Map<String, Value>, &'static str> {
    let Value::Object(mut payload) =
        serde_json::from_slice::<Value>(body).map_err(|_| "body is not valid JSON")?
    else {
        return Err("body is not a JSON object");
    };

    if let Some(audio) = payload.get("audio") {
        let encoded = audio.as_str().ok_or("audio must be a base64 string")?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| "audio is not valid base64")?;
        tracing::debug!(bytes = decoded.len(), "received audio payload");
    }

    let score = payload
        .get("pronunciationScore")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    payload.insert(
        "feedback".to_string(),
        Value::String(pronunciation_feedback(score).to_string()),
    );

    Ok(payload)
}

/// Transcribe failure, reported without internal detail
#[derive(Debug)]
pub struct TranscribeError;

impl IntoResponse for TranscribeError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "success": false,
                "error": "Failed to process audio",
            })),
        )
            .into_response()
    }
}
