//! Speech synthesis over the Azure cognitive services REST API.
//!
//! The service is asked for headerless 16 kHz mono 16-bit PCM, which is
//! exactly what the client player consumes, so the response body can be
//! relayed to the browser without touching a single byte.

mod ssml;
mod stream;
mod text;

use std::{env, time::Duration};

use futures_util::{StreamExt, TryStreamExt};
use reqwest::{header, Client};
use thiserror::Error;
use tracing::debug;

pub use ssml::{build_ssml, escape_xml};
pub use stream::{timed, SpeechStream};
pub use text::clean_for_speech;

/// Output format requested from the service.
pub const OUTPUT_FORMAT: &str = "raw-16khz-16bit-mono-pcm";

const DEFAULT_ENDPOINT: &str = "https://westus.tts.speech.microsoft.com/cognitiveservices/v1";

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Speech request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Speech service rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub endpoint: String,
    pub voice: String,
    pub language: String,
    pub style: String,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            voice: "zh-CN-XiaoxiaoNeural".to_string(),
            language: "zh-CN".to_string(),
            style: "customerservice".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SpeechConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: env::var("TTS_ENDPOINT").unwrap_or(defaults.endpoint),
            voice: env::var("TTS_VOICE").unwrap_or(defaults.voice),
            language: env::var("TTS_LANGUAGE").unwrap_or(defaults.language),
            style: env::var("TTS_STYLE").unwrap_or(defaults.style),
            timeout: env::var("TTS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechClient {
    config: SpeechConfig,
    client: Client,
}

impl SpeechClient {
    pub fn new(config: SpeechConfig) -> Result<Self, TtsError> {
        // Only the connection is bounded; the body streams for as long as
        // the utterance lasts.
        let client = Client::builder().connect_timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    /// Start synthesizing `text` with the caller's bearer token. Resolves as
    /// soon as the response headers are in; the audio follows on the stream.
    pub async fn synthesize(&self, text: &str, token: &str) -> Result<SpeechStream, TtsError> {
        let ssml = build_ssml(&self.config, text);
        debug!(chars = text.chars().count(), voice = %self.config.voice, "requesting speech");

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header(header::CONTENT_TYPE, "application/ssml+xml")
            .header(header::USER_AGENT, "1")
            .bearer_auth(token)
            .body(ssml)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes_stream().map_err(TtsError::from).boxed())
    }
}
