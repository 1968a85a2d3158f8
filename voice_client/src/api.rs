//! Talking to the voice endpoint.

use std::path::Path;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use llm_core::Message;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use llm_core::wire::{decode_uri_component, RESPONSE_HEADER, TRANSCRIPT_HEADER, TTS_TOKEN_HEADER};

use crate::config::ClientConfig;

/// What the user is sending this turn.
pub enum Utterance {
    Text(String),
    Recording { data: Vec<u8>, file_name: String, mime: &'static str },
}

impl Utterance {
    pub async fn from_file(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();
        let mime = match path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("webm") => "audio/webm",
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            Some("m4a") => "audio/mp4",
            _ => "application/octet-stream",
        };
        Ok(Utterance::Recording { data, file_name, mime })
    }
}

/// Server answer: both sides of the turn as text, and the speech still
/// streaming in.
pub struct Reply {
    pub transcript: String,
    pub response: String,
    pub audio: BoxStream<'static, reqwest::Result<Bytes>>,
}

fn text_header(response: &Response, name: &str) -> Result<String> {
    let raw = response
        .headers()
        .get(name)
        .with_context(|| format!("Response is missing {name}"))?
        .to_str()
        .with_context(|| format!("{name} is not ASCII"))?;
    decode_uri_component(raw).with_context(|| format!("{name} is not valid percent-encoding"))
}

pub async fn submit(
    client: &Client,
    config: &ClientConfig,
    utterance: Utterance,
    history: &[Message],
) -> Result<Reply> {
    let mut form = match utterance {
        Utterance::Text(text) => Form::new().text("input", text),
        Utterance::Recording { data, file_name, mime } => {
            Form::new().part("input", Part::bytes(data).file_name(file_name).mime_str(mime)?)
        }
    };
    for message in history {
        form = form.text("message", serde_json::to_string(message)?);
    }

    let mut request = client.post(&config.server_url).multipart(form);
    if let Some(token) = &config.tts_token {
        request = request.header(TTS_TOKEN_HEADER, token);
    }

    let response = request.send().await.context("Request to voice server failed")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Server returned {status}: {body}");
    }

    Ok(Reply {
        transcript: text_header(&response, TRANSCRIPT_HEADER)?,
        response: text_header(&response, RESPONSE_HEADER)?,
        audio: response.bytes_stream().boxed(),
    })
}
