//! Gapless playback of a streamed PCM response.
//!
//! [`StreamingPlayer::play`] pulls chunks off a byte stream, reassembles
//! samples that straddle chunk boundaries and schedules each decoded block on
//! the sink so that it starts exactly where the previous one ends. The device
//! renders on its own clock; the player only decides *when* each block starts.
//!
//! A player owns at most one [`PlaybackSession`] at a time. Starting a new one
//! closes the old sink first, and every session is identified by a
//! generation number so that late notifications from an abandoned sink, or a
//! read loop that outlived its session, cannot touch the current one.

use std::pin::pin;
use std::sync::{Arc, Weak};

use futures_core::Stream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::PlayerError;
use crate::output::{AudioBackend, AudioBuffer, AudioSink, EndedCallback};
use crate::pcm::{PcmDecoder, SAMPLE_RATE};

/// Called once when an utterance finishes on its own.
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

struct PlaybackSession<S> {
    id: u64,
    sink: S,
    next_start: f64,
    decoder: PcmDecoder,
    scheduled: u64,
    ended: u64,
    end_of_stream: bool,
    on_complete: Option<CompletionCallback>,
}

impl<S> PlaybackSession<S> {
    fn drained(&self) -> bool {
        self.end_of_stream && self.ended == self.scheduled
    }
}

struct SessionSlot<S> {
    current: Option<PlaybackSession<S>>,
    generation: u64,
}

struct Shared<S> {
    slot: Mutex<SessionSlot<S>>,
    playing: watch::Sender<bool>,
}

impl<S: AudioSink> Shared<S> {
    /// Close the sink of the current session, if any, and hand the session
    /// back so the caller can decide what to do with its completion callback.
    fn teardown(&self, slot: &mut SessionSlot<S>) -> Option<PlaybackSession<S>> {
        let mut session = slot.current.take()?;
        session.sink.close();
        self.playing.send_replace(false);
        debug!(
            session = session.id,
            buffers = session.scheduled,
            samples = session.decoder.decoded_samples(),
            "playback session closed"
        );
        Some(session)
    }

    fn buffer_ended(&self, id: u64, seq: u64) {
        let mut slot = self.slot.lock();
        let Some(session) = slot.current.as_mut().filter(|s| s.id == id) else {
            trace!(session = id, seq, "ignoring buffer end from a closed session");
            return;
        };
        session.ended += 1;
        trace!(session = id, seq, ended = session.ended, "buffer ended");
        if !session.drained() {
            return;
        }

        let finished = self.teardown(&mut slot);
        drop(slot);
        if let Some(session) = finished {
            complete(session);
        }
    }
}

fn complete<S>(session: PlaybackSession<S>) {
    info!(session = session.id, "playback finished");
    if let Some(on_complete) = session.on_complete {
        on_complete();
    }
}

/// Streams raw 16 kHz mono PCM to an audio backend.
pub struct StreamingPlayer<B: AudioBackend> {
    backend: B,
    shared: Arc<Shared<B::Sink>>,
}

impl<B: AudioBackend> StreamingPlayer<B> {
    pub fn new(backend: B) -> Self {
        let (playing, _) = watch::channel(false);
        Self {
            backend,
            shared: Arc::new(Shared {
                slot: Mutex::new(SessionSlot {
                    current: None,
                    generation: 0,
                }),
                playing,
            }),
        }
    }

    pub fn is_playing(&self) -> bool {
        *self.shared.playing.borrow()
    }

    /// Watch `is_playing` transitions, e.g. to drive a UI indicator.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shared.playing.subscribe()
    }

    /// Generation number of the active session.
    pub fn session_id(&self) -> Option<u64> {
        self.shared.slot.lock().current.as_ref().map(|s| s.id)
    }

    /// Cut playback short. Does not run the completion callback.
    pub fn stop(&self) {
        let mut slot = self.shared.slot.lock();
        if let Some(session) = self.shared.teardown(&mut slot) {
            debug!(session = session.id, "playback stopped");
        }
    }

    /// Play `stream` until it ends or another `play`/`stop` cancels it.
    ///
    /// Returns once the stream has been fully read and scheduled, which is
    /// usually well before the audio has finished; `on_complete` fires when
    /// the last buffer is done playing. If the stream yields an error the
    /// session is torn down and the error is returned without calling
    /// `on_complete`.
    pub async fn play<St, C, E, F>(&self, stream: St, on_complete: F) -> Result<(), PlayerError>
    where
        St: Stream<Item = Result<C, E>>,
        C: AsRef<[u8]>,
        E: Into<anyhow::Error>,
        F: FnOnce() + Send + 'static,
    {
        let id = self.open_session(Box::new(on_complete))?;
        let mut stream = pin!(stream);

        loop {
            let next = stream.next().await;

            let mut slot = self.shared.slot.lock();
            let Some(session) = slot.current.as_mut().filter(|s| s.id == id) else {
                debug!(session = id, "session cancelled, abandoning stream");
                return Ok(());
            };

            match next {
                Some(Ok(chunk)) => {
                    let samples = session.decoder.push(chunk.as_ref());
                    if !samples.is_empty() {
                        self.schedule(session, samples);
                    }
                }
                Some(Err(e)) => {
                    let err: anyhow::Error = e.into();
                    warn!(session = id, "audio stream failed: {err:#}");
                    self.shared.teardown(&mut slot);
                    return Err(PlayerError::Stream(err));
                }
                None => {
                    if session.decoder.finish() {
                        debug!(session = id, "dropped trailing odd byte at end of stream");
                    }
                    session.end_of_stream = true;
                    debug!(session = id, buffers = session.scheduled, "stream ended");

                    // Everything may already have played out (or nothing was
                    // ever scheduled); no buffer end is coming to finish it.
                    if session.drained() {
                        let finished = self.shared.teardown(&mut slot);
                        drop(slot);
                        if let Some(session) = finished {
                            complete(session);
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    fn open_session(&self, on_complete: CompletionCallback) -> Result<u64, PlayerError> {
        self.stop();
        let sink = self.backend.open(SAMPLE_RATE)?;

        let mut slot = self.shared.slot.lock();
        // A concurrent `play` may have slipped in between `stop` and here.
        self.shared.teardown(&mut slot);

        slot.generation += 1;
        let id = slot.generation;
        let next_start = sink.now();
        slot.current = Some(PlaybackSession {
            id,
            sink,
            next_start,
            decoder: PcmDecoder::new(),
            scheduled: 0,
            ended: 0,
            end_of_stream: false,
            on_complete: Some(on_complete),
        });
        self.shared.playing.send_replace(true);
        debug!(session = id, start = next_start, "playback session opened");
        Ok(id)
    }

    fn schedule(&self, session: &mut PlaybackSession<B::Sink>, samples: Vec<f32>) {
        let buffer = AudioBuffer::new(samples, SAMPLE_RATE);
        let start = session.next_start;
        session.next_start = start + buffer.duration();
        session.scheduled += 1;

        let now = session.sink.now();
        if start < now {
            warn!(
                session = session.id,
                late_ms = (now - start) * 1000.0,
                "audio arrived after its start time"
            );
        }

        let on_ended = ended_hook(Arc::downgrade(&self.shared), session.id, session.scheduled);
        trace!(session = session.id, seq = session.scheduled, start, samples = buffer.len(), "scheduling buffer");
        session.sink.schedule(buffer, start, Some(on_ended));
    }
}

fn ended_hook<S: AudioSink>(shared: Weak<Shared<S>>, id: u64, seq: u64) -> EndedCallback {
    Box::new(move || {
        if let Some(shared) = shared.upgrade() {
            shared.buffer_ended(id, seq);
        }
    })
}

impl<B: AudioBackend> Drop for StreamingPlayer<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
