//! Silence Stripping
//!
//! Removes every span quieter than a threshold that lasts at least a minimum
//! length. Detection slides a window of the minimum length over the audio in
//! 1 ms steps; consecutive silent windows merge into one silent span.

use tracing::debug;

use crate::engine::buffer::{db_to_linear, frames_for_ms, AudioBuffer};

// ============================================================================
// Constants
// ============================================================================

/// Default silence threshold in dBFS
pub const DEFAULT_SILENCE_THRESHOLD_DB: f32 = -40.0;

/// Default minimum length of a removable silent span
pub const DEFAULT_MIN_SILENCE_MS: u64 = 100;

// ============================================================================
// Silence Stripper
// ============================================================================

/// Detects and removes silent spans from a buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceStripper {
    /// Windows with RMS below this level (dBFS) count as silent
    pub threshold_db: f32,
    /// Shortest span that gets removed
    pub min_silence_ms: u64,
}

impl Default for SilenceStripper {
    fn default() -> Self {
        Self {
            threshold_db: DEFAULT_SILENCE_THRESHOLD_DB,
            min_silence_ms: DEFAULT_MIN_SILENCE_MS,
        }
    }
}

impl SilenceStripper {
    pub fn new(threshold_db: f32, min_silence_ms: u64) -> Self {
        Self {
            threshold_db,
            min_silence_ms,
        }
    }

    /// Concatenation of every non-silent span, in order
    ///
    /// A buffer that is silent throughout comes back empty.
    pub fn strip(&self, buffer: &AudioBuffer) -> AudioBuffer {
        let spans = self.detect_nonsilent(buffer);

        let stripped = buffer.select_frames(&spans);

        debug!(
            "Stripped silence: {} ms -> {} ms ({} spans kept)",
            buffer.duration_ms(),
            stripped.duration_ms(),
            spans.len()
        );
        stripped
    }

    /// Silent spans as frame ranges `[start, end)`
    pub fn detect_silence(&self, buffer: &AudioBuffer) -> Vec<(usize, usize)> {
        let len = buffer.len();
        if len == 0 {
            return Vec::new();
        }

        let rate = buffer.sample_rate();
        let window = frames_for_ms(self.min_silence_ms, rate).clamp(1, len);
        let step = frames_for_ms(1, rate).max(1);
        let energy = EnergyIndex::new(buffer);
        let threshold = db_to_linear(self.threshold_db);

        // Window starts in 1 ms steps, plus the last window flush with the end
        let last_start = len - window;
        let mut starts: Vec<usize> = (0..=last_start).step_by(step).collect();
        if starts.last() != Some(&last_start) {
            starts.push(last_start);
        }

        let mut spans: Vec<(usize, usize)> = Vec::new();
        for start in starts {
            if energy.rms(start, start + window) >= threshold {
                continue;
            }
            match spans.last_mut() {
                Some(span) if start <= span.1 => span.1 = start + window,
                _ => spans.push((start, start + window)),
            }
        }
        spans
    }

    /// Non-silent spans as frame ranges `[start, end)`
    pub fn detect_nonsilent(&self, buffer: &AudioBuffer) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut cursor = 0;
        for (start, end) in self.detect_silence(buffer) {
            if start > cursor {
                spans.push((cursor, start));
            }
            cursor = end;
        }
        if cursor < buffer.len() {
            spans.push((cursor, buffer.len()));
        }
        spans
    }
}

/// Prefix sums of per-frame energy, averaged over channels
struct EnergyIndex {
    prefix: Vec<f64>,
}

impl EnergyIndex {
    fn new(buffer: &AudioBuffer) -> Self {
        let channels = buffer.channels() as f64;
        let mut prefix = Vec::with_capacity(buffer.len() + 1);
        prefix.push(0.0);

        let mut total = 0.0_f64;
        for frame in 0..buffer.len() {
            let mut frame_energy = 0.0_f64;
            for ch in 0..buffer.channels() {
                let s = buffer.channel(ch)[frame] as f64;
                frame_energy += s * s;
            }
            total += frame_energy / channels;
            prefix.push(total);
        }

        Self { prefix }
    }

    fn rms(&self, start: usize, end: usize) -> f32 {
        let frames = (end - start) as f64;
        let sum = (self.prefix[end] - self.prefix[start]).max(0.0);
        (sum / frames).sqrt() as f32
    }
}
