//! Terminal front end for the voice endpoint.
//!
//! Each line on stdin is one user turn. `/file <path>` uploads a recording
//! instead of text, `/stop` silences the current reply and `/devices` lists
//! output devices. The spoken reply starts playing while it is still
//! downloading; a new turn cuts off whatever is playing.

mod api;
mod config;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use llm_core::Message;
use player_core::{CpalBackend, StreamingPlayer};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::{submit, Utterance};
use crate::config::ClientConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    let config = ClientConfig::from_env();
    info!("Talking to {}", config.server_url);

    let backend = match &config.output_device {
        Some(name) => CpalBackend::with_device(name.clone()),
        None => CpalBackend::new(),
    };
    let player = Arc::new(StreamingPlayer::new(backend));
    let http = reqwest::Client::new();

    let mut history: Vec<Message> = Vec::new();
    let mut playback: Option<JoinHandle<()>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type a message and press enter (Ctrl-D to quit).");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let utterance = match line {
            "/stop" => {
                player.stop();
                continue;
            }
            "/devices" => {
                match CpalBackend::output_devices() {
                    Ok(devices) => devices.iter().for_each(|d| println!("  {d}")),
                    Err(e) => error!("Failed to list devices: {e}"),
                }
                continue;
            }
            _ => match line.strip_prefix("/file ") {
                Some(path) => match Utterance::from_file(Path::new(path.trim())).await {
                    Ok(utterance) => utterance,
                    Err(e) => {
                        error!("{e:#}");
                        continue;
                    }
                },
                None => Utterance::Text(line.to_string()),
            },
        };

        // Interrupt the previous reply before the next one is requested.
        player.stop();
        if let Some(task) = playback.take() {
            task.abort();
        }

        let started = Instant::now();
        let reply = match submit(&http, &config, utterance, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("{e:#}");
                continue;
            }
        };
        info!("Reply headers after {:.2?}", started.elapsed());

        println!("you: {}", reply.transcript);
        println!("assistant: {}", reply.response);
        history.push(Message::user(reply.transcript));
        history.push(Message::assistant(reply.response));

        let player = player.clone();
        playback = Some(tokio::spawn(async move {
            let result = player
                .play(reply.audio, move || {
                    info!("Finished speaking after {:.2?}", started.elapsed());
                })
                .await;
            if let Err(e) = result {
                error!("Playback failed: {e}");
            }
        }));
    }

    // Stdin closed: let the last reply finish before exiting.
    if let Some(task) = playback.take() {
        let _ = task.await;
    }
    let mut playing = player.subscribe();
    while *playing.borrow_and_update() {
        if playing.changed().await.is_err() {
            break;
        }
    }
    Ok(())
}
