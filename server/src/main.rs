use std::net::SocketAddr;

use anyhow::Context;
use llm_core::GroqClient;
use tokio::net::TcpListener;
use tracing::info;
use tts_core::{SpeechClient, SpeechConfig};

use server::{app, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting voice chat server...");

    let groq = GroqClient::from_env()?;
    info!(
        "Groq configured: chat model={}, transcription model={}",
        groq.config().chat_model,
        groq.config().transcription_model
    );

    let speech_config = SpeechConfig::from_env();
    info!("Speech synthesis: voice={} via {}", speech_config.voice, speech_config.endpoint);
    let speech = SpeechClient::new(speech_config).context("Failed to build speech client")?;

    // Load configuration from environment
    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, request_timeout={}s, max_body={} bytes",
        config.port, config.request_timeout_secs, config.max_body_bytes
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let app = app(AppState::new(groq, speech, config));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
