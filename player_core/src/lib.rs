//! Real-time playback of streamed raw PCM speech.
//!
//! The speech endpoint answers with headerless 16 kHz mono `s16le` audio.
//! [`StreamingPlayer`] turns that byte stream into contiguous audio buffers on
//! an [`AudioBackend`] while the response is still downloading. Enable the
//! `cpal` feature for the sound card backend.

pub mod error;
pub mod output;
pub mod pcm;
pub mod player;
pub mod resample;

#[cfg(feature = "cpal")]
pub mod cpal_output;

pub use error::PlayerError;
pub use output::{AudioBackend, AudioBuffer, AudioSink, EndedCallback};
pub use pcm::{PcmDecoder, BYTES_PER_SAMPLE, SAMPLE_RATE};
pub use player::{CompletionCallback, StreamingPlayer};
pub use resample::BufferResampler;

#[cfg(feature = "cpal")]
pub use cpal_output::{CpalBackend, CpalSink};
