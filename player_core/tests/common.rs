//! Common utilities for player tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use player_core::{AudioBackend, AudioBuffer, AudioSink, EndedCallback, PlayerError};

struct Pending {
    end: f64,
    on_ended: Option<EndedCallback>,
}

#[derive(Default)]
struct SinkRecord {
    closed: bool,
    buffers: Vec<(f64, AudioBuffer)>,
    pending: Vec<Pending>,
}

#[derive(Default)]
struct BackendState {
    clock: f64,
    sinks: Vec<SinkRecord>,
    fail_open: bool,
}

/// Backend whose clock only moves when the test says so.
#[derive(Clone, Default)]
pub struct ManualBackend {
    state: Arc<Mutex<BackendState>>,
}

pub struct ManualSink {
    index: usize,
    state: Arc<Mutex<BackendState>>,
}

impl AudioBackend for ManualBackend {
    type Sink = ManualSink;

    fn open(&self, sample_rate: u32) -> Result<ManualSink, PlayerError> {
        assert_eq!(sample_rate, 16_000);
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(PlayerError::output("no device"));
        }
        state.sinks.push(SinkRecord::default());
        Ok(ManualSink {
            index: state.sinks.len() - 1,
            state: self.state.clone(),
        })
    }
}

impl AudioSink for ManualSink {
    fn now(&self) -> f64 {
        self.state.lock().unwrap().clock
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn schedule(&mut self, buffer: AudioBuffer, start: f64, on_ended: Option<EndedCallback>) {
        let mut state = self.state.lock().unwrap();
        let sink = &mut state.sinks[self.index];
        assert!(!sink.closed, "scheduled on a closed sink");
        let end = start + buffer.duration();
        sink.buffers.push((start, buffer));
        sink.pending.push(Pending { end, on_ended });
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        let sink = &mut state.sinks[self.index];
        sink.closed = true;
        sink.pending.clear();
    }
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clock(&self, at: f64) {
        self.state.lock().unwrap().clock = at;
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Move the clock forward and deliver every buffer end it passes.
    pub fn advance(&self, secs: f64) {
        let callbacks = {
            let mut state = self.state.lock().unwrap();
            state.clock += secs;
            let clock = state.clock;
            let mut due = Vec::new();
            for sink in state.sinks.iter_mut().filter(|s| !s.closed) {
                for pending in sink.pending.iter_mut().filter(|p| p.end <= clock) {
                    if let Some(cb) = pending.on_ended.take() {
                        due.push((pending.end, cb));
                    }
                }
            }
            due.sort_by(|a, b| a.0.total_cmp(&b.0));
            due
        };
        for (_, cb) in callbacks {
            cb();
        }
    }

    /// Play everything that has been scheduled so far.
    pub fn run_to_end(&self) {
        let remaining = {
            let state = self.state.lock().unwrap();
            let last_end = state
                .sinks
                .iter()
                .flat_map(|s| s.pending.iter().map(|p| p.end))
                .fold(state.clock, f64::max);
            last_end - state.clock
        };
        self.advance(remaining);
    }

    /// Deliver the buffer ends of `sink` in reverse order.
    pub fn end_in_reverse(&self, sink: usize, after_each: impl Fn(usize)) {
        let callbacks: Vec<EndedCallback> = {
            let mut state = self.state.lock().unwrap();
            state.sinks[sink]
                .pending
                .iter_mut()
                .rev()
                .filter_map(|p| p.on_ended.take())
                .collect()
        };
        for (i, cb) in callbacks.into_iter().enumerate() {
            cb();
            after_each(i);
        }
    }

    pub fn sink_count(&self) -> usize {
        self.state.lock().unwrap().sinks.len()
    }

    pub fn open_sinks(&self) -> usize {
        self.state.lock().unwrap().sinks.iter().filter(|s| !s.closed).count()
    }

    pub fn is_closed(&self, sink: usize) -> bool {
        self.state.lock().unwrap().sinks[sink].closed
    }

    pub fn buffer_count(&self, sink: usize) -> usize {
        self.state.lock().unwrap().sinks[sink].buffers.len()
    }

    /// `(start, duration)` of every buffer scheduled on `sink`.
    pub fn timeline(&self, sink: usize) -> Vec<(f64, f64)> {
        self.state.lock().unwrap().sinks[sink]
            .buffers
            .iter()
            .map(|(start, buffer)| (*start, buffer.duration()))
            .collect()
    }

    pub fn samples(&self, sink: usize) -> Vec<f32> {
        self.state.lock().unwrap().sinks[sink]
            .buffers
            .iter()
            .flat_map(|(_, buffer)| buffer.samples().to_vec())
            .collect()
    }
}

/// Counts completion callbacks.
#[derive(Clone, Default)]
pub struct Completions(Arc<AtomicUsize>);

impl Completions {
    pub fn callback(&self) -> impl FnOnce() + Send + 'static {
        let count = self.0.clone();
        move || {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub type Chunk = Result<Vec<u8>, std::io::Error>;

pub fn chunks(parts: &[&[u8]]) -> futures_util::stream::Iter<std::vec::IntoIter<Chunk>> {
    let items: Vec<Chunk> = parts.iter().map(|p| Ok(p.to_vec())).collect();
    futures_util::stream::iter(items)
}

pub fn le_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
