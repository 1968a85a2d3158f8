//! Streaming helpers for synthesized audio.
//!
//! The synthesis service answers with a chunked body of raw PCM. We never
//! buffer it: the server forwards each chunk to the client as soon as it
//! arrives, and the client player schedules it as soon as it is received.

use std::pin::Pin;
use std::time::Instant;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use tracing::info;

use crate::TtsError;

/// Body of a successful synthesis response.
pub type SpeechStream = Pin<Box<dyn Stream<Item = Result<Bytes, TtsError>> + Send>>;

/// Pass `stream` through unchanged and log how long it took to drain,
/// measured from `started`, once the last chunk has gone by.
pub fn timed<S, T>(stream: S, label: String, started: Instant) -> impl Stream<Item = T> + Send
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    async_stream::stream! {
        let mut stream = Box::pin(stream);
        let mut chunks = 0usize;
        while let Some(item) = stream.next().await {
            chunks += 1;
            yield item;
        }
        info!("{label}: {:.3}ms ({chunks} chunks)", started.elapsed().as_secs_f64() * 1000.0);
    }
}
