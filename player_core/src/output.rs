//! Audio output abstraction.
//!
//! The player never talks to a sound card directly. It opens a sink through
//! an [`AudioBackend`], asks the sink what time it is, and hands it buffers
//! stamped with absolute start times in the sink's own clock. Rendering is the
//! sink's business and happens on whatever real-time thread the platform uses.

use crate::error::PlayerError;

/// Invoked once a scheduled buffer has finished playing.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// A block of mono f32 samples at a fixed rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds, in the same units as [`AudioSink::now`].
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Opens output sinks. One sink per playback session.
pub trait AudioBackend: Send + Sync {
    type Sink: AudioSink;

    fn open(&self, sample_rate: u32) -> Result<Self::Sink, PlayerError>;
}

/// An open rendering context.
///
/// `on_ended` must never be invoked from inside
/// [`schedule`](AudioSink::schedule); the player holds its session lock while
/// scheduling. Callbacks that still trickle in after
/// [`close`](AudioSink::close) are ignored by the player.
pub trait AudioSink: Send + 'static {
    /// Current position of the device clock, in seconds.
    fn now(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Queue `buffer` to start exactly at `start` on the device clock.
    fn schedule(&mut self, buffer: AudioBuffer, start: f64, on_ended: Option<EndedCallback>);

    /// Silence everything pending and release the device. Idempotent.
    fn close(&mut self);
}
