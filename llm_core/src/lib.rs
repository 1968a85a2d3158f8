mod prompt;
pub mod wire;

use std::{env, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use prompt::system_prompt;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Who said a line of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of prior conversation, as the browser sends it back to us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Structure for the chat completions request
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Structure for the chat completions response
#[derive(Deserialize)]
struct ChatResponse {
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

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub transcription_language: String,
    pub timeout: Duration,
}

impl GroqConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "llama3-70b-8192".to_string(),
            transcription_model: "whisper-large-v3".to_string(),
            transcription_language: "zh".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Reads `GROQ_API_KEY` (required) plus optional overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GROQ_API_KEY").context("GROQ_API_KEY must be set in the environment")?;
        let mut config = Self::new(api_key);

        if let Ok(url) = env::var("GROQ_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            config.chat_model = model;
        }
        if let Ok(model) = env::var("TRANSCRIPTION_MODEL") {
            config.transcription_model = model;
        }
        if let Ok(lang) = env::var("TRANSCRIPTION_LANGUAGE") {
            config.transcription_language = lang;
        }
        if let Some(secs) = env::var("LLM_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct GroqClient {
    config: GroqConfig,
    client: Client,
}

impl GroqClient {
    pub fn new(config: GroqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GroqConfig::from_env()?)
    }

    pub fn config(&self) -> &GroqConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Transcribe recorded speech. Empty transcripts and failed calls both
    /// come back as `None`: either way there is nothing to answer.
    pub async fn transcribe(&self, audio: Vec<u8>, file_name: &str, mime: &str) -> Option<String> {
        match self.request_transcription(audio, file_name, mime).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("Transcription came back empty");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                warn!("Transcription failed: {e:#}");
                None
            }
        }
    }

    async fn request_transcription(&self, audio: Vec<u8>, file_name: &str, mime: &str) -> Result<String> {
        let file = multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.config.transcription_model.clone())
            .text("language", self.config.transcription_language.clone());

        let response = self
            .client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json::<TranscriptionResponse>()
            .await?;
        Ok(response.text)
    }

    /// Ask the chat model for the next assistant turn.
    pub async fn complete(&self, system: &str, history: &[Message], user_text: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage { role: "system", content: system });
        messages.extend(history.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        }));
        messages.push(ChatMessage { role: "user", content: user_text });

        let req_body = ChatRequest {
            model: &self.config.chat_model,
            messages,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&req_body)
            .send()
            .await?
            .error_for_status()? // convert non-200 into error
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no content"))
    }
}
