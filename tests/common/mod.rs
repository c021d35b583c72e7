//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde_json::Value;
use talkback::voice::{OnDone, RecognitionConfig, SpeechRecognizer, SpeechSynthesizer, Utterance};
use talkback::{ChatBackend, ConversationContext, Error, Message, Result};

/// Recognizer that records calls and can be told to refuse to start
#[derive(Default)]
pub struct ScriptedRecognizer {
    calls: Mutex<Vec<&'static str>>,
    fail_start: AtomicBool,
}

impl ScriptedRecognizer {
    /// A recognizer whose `start` always fails
    #[must_use]
    pub fn failing() -> Self {
        let recognizer = Self::default();
        recognizer.fail_start.store(true, Ordering::SeqCst);
        recognizer
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&self, _config: &RecognitionConfig) -> Result<()> {
        self.calls.lock().unwrap().push("start");
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Recognition("not-allowed".to_string()));
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.calls.lock().unwrap().push("stop");
        Ok(())
    }
}

/// Synthesizer that holds completion callbacks until told to finish
#[derive(Default)]
pub struct RecordingSynthesizer {
    spoken: Mutex<Vec<Utterance>>,
    pending: Mutex<Vec<OnDone>>,
    cancels: AtomicUsize,
}

impl RecordingSynthesizer {
    /// Texts spoken so far, oldest first
    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.spoken.lock().unwrap().last().cloned()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Report natural completion for every utterance started so far
    pub fn finish_all(&self) {
        let pending: Vec<OnDone> = self.pending.lock().unwrap().drain(..).collect();
        for on_end in pending {
            on_end();
        }
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&self, utterance: Utterance, on_end: OnDone) -> Result<()> {
        self.spoken.lock().unwrap().push(utterance);
        self.pending.lock().unwrap().push(on_end);
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Chat backend answering from a script and recording what it was sent
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String>>>,
    seen: Mutex<Vec<(String, ConversationContext)>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn replying(replies: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<(String, ConversationContext)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send_message(&self, message: &str, context: &ConversationContext) -> Result<Message> {
        self.seen
            .lock()
            .unwrap()
            .push((message.to_string(), context.clone()));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::EmptyResponse("no scripted reply".to_string())));
        reply.map(Message::assistant)
    }
}

/// A request captured by a stub upstream
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

/// Stub OpenAI-compatible upstream answering every completion with `body`
pub fn completion_upstream(status: StatusCode, body: Value) -> (Router, Arc<Mutex<Vec<CapturedRequest>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let recorded = captured.clone();

    let router = Router::new().route(
        "/chat/completions",
        post(move |headers: HeaderMap, Json(request): Json<Value>| {
            let recorded = recorded.clone();
            let body = body.clone();
            async move {
                recorded.lock().unwrap().push(CapturedRequest {
                    authorization: headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(ToString::to_string),
                    body: request,
                });
                (status, Json(body))
            }
        }),
    );

    (router, captured)
}

/// Completion body whose first choice says `content`
#[must_use]
pub fn completion(content: &str) -> Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });
    format!("http://{addr}")
}
