//! Sample rate conversion for output devices that will not run at 16 kHz.

use rubato::{FftFixedIn, Resampler};

use crate::error::PlayerError;

const CHUNK: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Converts whole mono buffers from one rate to another.
///
/// Every call starts from a clean filter state. The resampler's delay is cut
/// from the front and the tail is flushed with silence, so the output covers
/// the same stretch of time as the input.
pub struct BufferResampler {
    inner: FftFixedIn<f32>,
}

impl BufferResampler {
    pub fn new(from: u32, to: u32) -> Result<Self, PlayerError> {
        let inner = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK, SUB_CHUNKS, 1)
            .map_err(|e| PlayerError::output(format!("Failed to build resampler: {e}")))?;
        Ok(Self { inner })
    }

    /// Resample `input` into exactly `frames` output samples.
    pub fn process(&mut self, input: &[f32], frames: usize) -> Result<Vec<f32>, PlayerError> {
        if frames == 0 {
            return Ok(Vec::new());
        }
        self.inner.reset();
        let delay = self.inner.output_delay();
        let block_len = self.inner.input_frames_next();

        let mut out = Vec::with_capacity(frames + delay + self.inner.output_frames_max());
        let mut block = vec![0.0f32; block_len];
        let mut pos = 0;
        while out.len() < frames + delay {
            let end = (pos + block_len).min(input.len());
            block.fill(0.0);
            block[..end - pos].copy_from_slice(&input[pos..end]);
            pos = end;

            let resampled = self
                .inner
                .process(&[&block[..]], None)
                .map_err(|e| PlayerError::output(format!("Resampling failed: {e}")))?;
            out.extend_from_slice(&resampled[0]);
        }

        out.drain(..delay);
        out.truncate(frames);
        Ok(out)
    }
}
