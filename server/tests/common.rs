//! Common utilities for integration tests
//!
//! The app under test talks to a fake upstream served from this process, so
//! the whole transcription → completion → synthesis pipeline runs for real
//! over HTTP without leaving localhost.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use llm_core::{GroqClient, GroqConfig};
use serde_json::{json, Value};
use server::{app, config::ServerConfig, AppState};
use tokio::net::TcpListener;
use tts_core::{SpeechClient, SpeechConfig};

pub const GROQ_KEY: &str = "test-groq-key";
pub const TTS_TOKEN: &str = "good-token";

/// Five bytes of PCM, split so that the middle sample straddles two chunks.
pub const SPEECH_CHUNKS: [&[u8]; 3] = [&[0x00], &[0x40, 0x00], &[0xc0, 0x01]];

/// What the fake upstream has been asked.
#[derive(Clone, Default)]
pub struct Recorded {
    pub chat_requests: Arc<Mutex<Vec<Value>>>,
    pub ssml: Arc<Mutex<Vec<String>>>,
    pub uploads: Arc<Mutex<Vec<(String, String, usize)>>>,
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {token}"))
        .unwrap_or(false)
}

async fn fake_transcription(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers, GROQ_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut audio = Vec::new();
    let mut file_name = String::new();
    let mut model = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().unwrap_or_default().to_string();
                audio = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            }
            Some("model") => model = field.text().await.unwrap_or_default(),
            _ => {}
        }
    }
    recorded
        .uploads
        .lock()
        .unwrap()
        .push((file_name, model, audio.len()));

    match audio.as_slice() {
        b"broken" => (StatusCode::INTERNAL_SERVER_ERROR, "decoder crashed").into_response(),
        b"silence" => Json(json!({ "text": "   " })).into_response(),
        _ => Json(json!({ "text": " 我要寄快递 " })).into_response(),
    }
}

async fn fake_chat(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers, GROQ_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    recorded.chat_requests.lock().unwrap().push(body.clone());

    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let last = messages
        .last()
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    if last == "fail" {
        return (StatusCode::SERVICE_UNAVAILABLE, "over capacity").into_response();
    }

    let reply = format!("第{}条：{}", messages.len(), last);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": reply } }]
    }))
    .into_response()
}

async fn fake_speech(State(recorded): State<Recorded>, headers: HeaderMap, body: String) -> Response {
    if !authorized(&headers, TTS_TOKEN) {
        return (StatusCode::UNAUTHORIZED, "token rejected").into_response();
    }
    let format = headers
        .get("x-microsoft-outputformat")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if format != tts_core::OUTPUT_FORMAT {
        return StatusCode::BAD_REQUEST.into_response();
    }
    recorded.ssml.lock().unwrap().push(body);

    let stream = async_stream::stream! {
        for chunk in SPEECH_CHUNKS {
            yield Ok::<_, std::io::Error>(bytes::Bytes::from_static(chunk));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    Body::from_stream(stream).into_response()
}

async fn spawn_upstream(recorded: Recorded) -> String {
    let router = Router::new()
        .route("/openai/v1/audio/transcriptions", post(fake_transcription))
        .route("/openai/v1/chat/completions", post(fake_chat))
        .route("/tts", post(fake_speech))
        .with_state(recorded);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Create a test app instance wired to a fresh fake upstream
pub async fn create_test_app() -> (Router, Recorded) {
    let recorded = Recorded::default();
    let upstream = spawn_upstream(recorded.clone()).await;

    let mut groq_config = GroqConfig::new(GROQ_KEY);
    groq_config.base_url = format!("{upstream}/openai/v1");
    groq_config.timeout = Duration::from_secs(10);
    let groq = GroqClient::new(groq_config).unwrap();

    let speech = SpeechClient::new(SpeechConfig {
        endpoint: format!("{upstream}/tts"),
        ..SpeechConfig::default()
    })
    .unwrap();

    let state = AppState::new(groq, speech, ServerConfig::default());
    (app(state), recorded)
}

/// Hand-rolled `multipart/form-data` body.
pub struct Form {
    boundary: String,
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: "----voice-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn message(self, role: &str, content: &str) -> Self {
        let json = json!({ "role": role, "content": content }).to_string();
        self.text("message", &json)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn into_body(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}
