//! The voice endpoint: transcript in, streamed speech out.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Local;
use llm_core::system_prompt;
use llm_core::wire::{encode_uri_component, RESPONSE_HEADER, TRANSCRIPT_HEADER, TTS_TOKEN_HEADER};
use tracing::info;

use crate::error::ApiError;
use crate::validation::{parse_voice_form, FormField, UserInput};
use crate::AppState;

/// Content type of the streamed reply: headerless 16 kHz mono s16le.
pub const AUDIO_CONTENT_TYPE: &str = "audio/L16;rate=16000;channels=1";

fn header_or<'a>(headers: &'a HeaderMap, name: &str, fallback: &'a str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(fallback)
}

fn log_stage(stage: &str, request_id: &str, started: Instant) {
    info!(
        "{stage} {request_id}: {:.3}ms",
        started.elapsed().as_secs_f64() * 1000.0
    );
}

async fn read_fields(mut multipart: Multipart) -> Result<Vec<FormField>, ApiError> {
    let mut fields = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed form: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Malformed form field {name}: {e}")))?;
        fields.push(FormField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    Ok(fields)
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn voice_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let request_id = header_or(&headers, "x-vercel-id", "local").to_string();
    let tts_token = header_or(&headers, TTS_TOKEN_HEADER, "empty").to_string();

    let started = Instant::now();
    let request = parse_voice_form(read_fields(multipart).await?)?;

    let transcript = match request.input {
        UserInput::Text(text) => text,
        UserInput::Audio {
            data,
            file_name,
            content_type,
        } => state
            .groq
            .transcribe(data.to_vec(), &file_name, &content_type)
            .await
            .ok_or(ApiError::InvalidAudio)?,
    };
    log_stage("transcribe", &request_id, started);

    let started = Instant::now();
    let prompt = system_prompt(Local::now());
    let reply = state
        .groq
        .complete(&prompt, &request.history, &transcript)
        .await?;
    log_stage("text completion", &request_id, started);

    let started = Instant::now();
    let speech = state
        .speech
        .synthesize(&tts_core::clean_for_speech(&reply), &tts_token)
        .await?;
    log_stage("speech request", &request_id, started);

    let body = tts_core::timed(speech, format!("stream {request_id}"), Instant::now());

    Ok((
        StatusCode::OK,
        [
            ("content-type", AUDIO_CONTENT_TYPE.to_string()),
            (TRANSCRIPT_HEADER, encode_uri_component(&transcript)),
            (RESPONSE_HEADER, encode_uri_component(&reply)),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
