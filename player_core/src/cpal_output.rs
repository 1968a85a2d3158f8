//! Sound card output through cpal.
//!
//! Each sink gets its own thread that owns the `cpal::Stream` (streams are
//! not `Send` on every host) and runs buffer-ended callbacks, so nothing the
//! player does on completion ever executes on the real-time audio thread.
//!
//! The device clock is the number of frames the output callback has rendered.
//! Buffers are converted to the device rate when they are scheduled and
//! placed on that clock by frame, so the callback only copies samples.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::PlayerError;
use crate::output::{AudioBackend, AudioBuffer, AudioSink, EndedCallback};
use crate::resample::BufferResampler;

/// Opens the default (or a named) output device.
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    device_name: Option<String>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    /// Names of the output devices on the default host.
    pub fn output_devices() -> Result<Vec<String>, PlayerError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| PlayerError::output(format!("Failed to enumerate devices: {e}")))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }
}

impl AudioBackend for CpalBackend {
    type Sink = CpalSink;

    fn open(&self, sample_rate: u32) -> Result<CpalSink, PlayerError> {
        CpalSink::open(self.device_name.clone(), sample_rate)
    }
}

/// Nearest device frame to `secs` on a clock running at `rate`.
fn frame_at(secs: f64, rate: u32) -> u64 {
    (secs * f64::from(rate)).round().max(0.0) as u64
}

struct Scheduled {
    start: u64,
    samples: Vec<f32>,
    on_ended: Option<EndedCallback>,
}

impl Scheduled {
    fn end(&self) -> u64 {
        self.start + self.samples.len() as u64
    }
}

#[derive(Default)]
struct Timeline {
    queue: VecDeque<Scheduled>,
    /// Frames every buffer is pushed back by, grown whenever one arrives
    /// after its start time.
    lag: u64,
    started: bool,
    closed: bool,
}

impl Timeline {
    /// Queue `samples` at frame `start`. If the clock (`now`) is already past
    /// it, the buffer and everything after it slide later instead of being
    /// skipped.
    fn push(&mut self, start: u64, samples: Vec<f32>, on_ended: Option<EndedCallback>, now: u64) {
        let mut at = start + self.lag;
        if at < now {
            self.lag += now - at;
            debug!(lag_frames = self.lag, "buffer arrived late, delaying the rest");
            at = now;
        }
        self.started = true;
        self.queue.push_back(Scheduled {
            start: at,
            samples,
            on_ended,
        });
    }

    /// Value at device frame `frame`, retiring buffers that are fully behind it.
    fn render(&mut self, frame: u64, ended: &Sender<EndedCallback>) -> f32 {
        while self.queue.front().is_some_and(|b| b.end() <= frame) {
            if let Some(on_ended) = self.queue.pop_front().and_then(|b| b.on_ended) {
                let _ = ended.send(on_ended);
            }
        }
        match self.queue.front() {
            Some(current) if current.start <= frame => current
                .samples
                .get((frame - current.start) as usize)
                .copied()
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

pub struct CpalSink {
    timeline: Arc<Mutex<Timeline>>,
    frames: Arc<AtomicU64>,
    device_rate: u32,
    sample_rate: u32,
    resampler: Option<BufferResampler>,
    shutdown: Option<Sender<()>>,
}

impl CpalSink {
    fn open(device_name: Option<String>, sample_rate: u32) -> Result<Self, PlayerError> {
        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let frames = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<u32, PlayerError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        let thread_timeline = timeline.clone();
        let thread_frames = frames.clone();
        thread::Builder::new()
            .name("pcm-output".into())
            .spawn(move || {
                let (ended_tx, ended_rx) = crossbeam_channel::unbounded::<EndedCallback>();
                let opened = build_output(
                    device_name.as_deref(),
                    sample_rate,
                    thread_timeline,
                    thread_frames,
                    ended_tx,
                );
                let (stream, device_rate) = match opened {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(device_rate));
                dispatch_until_closed(&ended_rx, &shutdown_rx);
                drop(stream);
                debug!("audio output thread exiting");
            })
            .map_err(|e| PlayerError::output(format!("Failed to spawn audio thread: {e}")))?;

        let device_rate = ready_rx
            .recv()
            .map_err(|_| PlayerError::output("Audio thread exited during setup"))??;

        let resampler = if device_rate == sample_rate {
            None
        } else {
            info!(from = sample_rate, to = device_rate, "resampling output");
            Some(BufferResampler::new(sample_rate, device_rate)?)
        };

        Ok(Self {
            timeline,
            frames,
            device_rate,
            sample_rate,
            resampler,
            shutdown: Some(shutdown_tx),
        })
    }

    fn to_device_rate(&mut self, buffer: AudioBuffer, frames: usize) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return buffer.into_samples();
        };
        match resampler.process(buffer.samples(), frames) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("{e}; playing silence in its place");
                vec![0.0; frames]
            }
        }
    }
}

impl AudioSink for CpalSink {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.device_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&mut self, buffer: AudioBuffer, start: f64, on_ended: Option<EndedCallback>) {
        // Frame counts come from the absolute start and end times so that
        // rounding never opens a gap between neighbouring buffers.
        let first = frame_at(start, self.device_rate);
        let last = frame_at(start + buffer.duration(), self.device_rate);
        let samples = self.to_device_rate(buffer, last.saturating_sub(first) as usize);

        let mut timeline = self.timeline.lock();
        if timeline.closed {
            return;
        }
        let now = self.frames.load(Ordering::Acquire);
        timeline.push(first, samples, on_ended, now);
    }

    fn close(&mut self) {
        {
            let mut timeline = self.timeline.lock();
            timeline.closed = true;
            timeline.queue.clear();
        }
        // Dropping the sender wakes the owner thread, which drops the stream.
        self.shutdown.take();
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn dispatch_until_closed(ended: &Receiver<EndedCallback>, shutdown: &Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(ended) -> msg => match msg {
                Ok(on_ended) => on_ended(),
                Err(_) => return,
            },
            recv(shutdown) -> _ => return,
        }
    }
}

/// Sample formats `build_output` has a stream for.
fn playable(format: SampleFormat) -> bool {
    matches!(format, SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
}

/// Prefer a playable config that runs at `sample_rate` natively, then the
/// device default, then any playable config at its highest rate.
fn choose_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    default: Option<SupportedStreamConfig>,
    sample_rate: u32,
) -> Option<SupportedStreamConfig> {
    let wanted = SampleRate(sample_rate);
    let ranges: Vec<_> = ranges
        .into_iter()
        .filter(|c| playable(c.sample_format()))
        .collect();

    let native = ranges
        .iter()
        .filter(|c| c.min_sample_rate() <= wanted && wanted <= c.max_sample_rate())
        .min_by_key(|c| c.channels());
    if let Some(range) = native {
        return Some(range.clone().with_sample_rate(wanted));
    }
    if let Some(default) = default.filter(|c| playable(c.sample_format())) {
        return Some(default);
    }
    ranges
        .into_iter()
        .min_by_key(|c| c.channels())
        .map(|c| c.with_max_sample_rate())
}

fn pick_config(device: &cpal::Device, sample_rate: u32) -> Result<SupportedStreamConfig, PlayerError> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| PlayerError::output(format!("Failed to query output configs: {e}")))?;
    choose_config(ranges, device.default_output_config().ok(), sample_rate)
        .ok_or_else(|| PlayerError::output("No output config with a usable sample format"))
}

fn build_output(
    device_name: Option<&str>,
    sample_rate: u32,
    timeline: Arc<Mutex<Timeline>>,
    frames: Arc<AtomicU64>,
    ended: Sender<EndedCallback>,
) -> Result<(Stream, u32), PlayerError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| PlayerError::output(format!("Failed to enumerate devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| PlayerError::output(format!("No output device named {name}")))?,
        None => host
            .default_output_device()
            .ok_or_else(|| PlayerError::output("No output device available"))?,
    };

    let supported = pick_config(&device, sample_rate)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    info!(
        device = %device.name().unwrap_or_default(),
        rate = config.sample_rate.0,
        channels = config.channels,
        format = ?sample_format,
        "opening audio output"
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, timeline, frames, ended)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, timeline, frames, ended)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, timeline, frames, ended)?,
        format => {
            return Err(PlayerError::output(format!("Unsupported sample format: {format:?}")))
        }
    };
    stream
        .play()
        .map_err(|e| PlayerError::output(format!("Failed to start stream: {e}")))?;

    Ok((stream, config.sample_rate.0))
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &StreamConfig,
    timeline: Arc<Mutex<Timeline>>,
    frames: Arc<AtomicU64>,
    ended: Sender<EndedCallback>,
) -> Result<Stream, PlayerError> {
    let channels = usize::from(config.channels.max(1));

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut timeline = timeline.lock();

                // The clock holds at zero until the first buffer arrives, so
                // a slow first chunk is not clipped.
                if timeline.closed || !timeline.started {
                    data.fill(T::from_sample(0.0f32));
                    return;
                }

                let base = frames.load(Ordering::Relaxed);
                let mut rendered = 0u64;
                for frame in data.chunks_mut(channels) {
                    let value = T::from_sample(timeline.render(base + rendered, &ended));
                    frame.fill(value);
                    rendered += 1;
                }
                frames.store(base + rendered, Ordering::Release);
            },
            move |err| {
                error!("Audio output error: {err}");
            },
            None,
        )
        .map_err(|e| PlayerError::output(format!("Failed to build output stream: {e}")))
}
