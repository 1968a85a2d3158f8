//! Raw PCM reassembly.
//!
//! The synthesis endpoint sends headerless 16-bit little-endian mono PCM,
//! cut into network chunks wherever the transport felt like it. A chunk may
//! end in the middle of a sample, so the decoder keeps the odd byte around
//! and glues it to the front of the next chunk.

/// Sample rate of the incoming stream and of every buffer we schedule.
pub const SAMPLE_RATE: u32 = 16_000;

/// Signed 16-bit samples.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Divisor that maps an `i16` into `[-1.0, 1.0)`.
const I16_SCALE: f32 = 32768.0;

#[derive(Debug, Default, Clone)]
pub struct PcmDecoder {
    leftover: Option<u8>,
    decoded: u64,
}

impl PcmDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as many whole samples as `chunk` (plus any carried byte)
    /// contains. A trailing odd byte is kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<f32> {
        let carried = usize::from(self.leftover.is_some());
        let total = carried + chunk.len();
        let usable = total - total % BYTES_PER_SAMPLE;

        let mut samples = Vec::with_capacity(usable / BYTES_PER_SAMPLE);
        let mut rest = chunk;

        if let Some(lo) = self.leftover.take() {
            match rest.split_first() {
                Some((&hi, tail)) => {
                    samples.push(decode_sample(lo, hi));
                    rest = tail;
                }
                None => {
                    self.leftover = Some(lo);
                    return samples;
                }
            }
        }

        let mut pairs = rest.chunks_exact(BYTES_PER_SAMPLE);
        samples.extend(pairs.by_ref().map(|pair| decode_sample(pair[0], pair[1])));
        if let [odd] = pairs.remainder() {
            self.leftover = Some(*odd);
        }

        self.decoded += samples.len() as u64;
        samples
    }

    /// Number of bytes waiting for their other half (always 0 or 1).
    pub fn pending(&self) -> usize {
        usize::from(self.leftover.is_some())
    }

    /// Total samples produced since construction.
    pub fn decoded_samples(&self) -> u64 {
        self.decoded
    }

    /// End of stream. A dangling byte can never become a sample, so it is
    /// dropped. Returns whether one was dropped.
    pub fn finish(&mut self) -> bool {
        self.leftover.take().is_some()
    }
}

#[inline]
fn decode_sample(lo: u8, hi: u8) -> f32 {
    f32::from(i16::from_le_bytes([lo, hi])) / I16_SCALE
}
