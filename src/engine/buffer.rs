//! Audio Buffer
//!
//! Decoded PCM audio and the primitives every pipeline stage is built from.
//! Samples are stored non-interleaved as 32-bit floats in [-1.0, 1.0].
//!
//! Buffers are values: every transform borrows its input and returns a new
//! buffer, so a stage can never corrupt audio another stage still holds.

use crate::engine::resample::resample_channels;
use crate::error::{Result, SpotmixError};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used when nothing else decides one (speech synthesis output)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

/// Number of frames covering `ms` milliseconds at `sample_rate`.
///
/// Rounds down, so converting back with [`AudioBuffer::duration_ms`] yields
/// `ms` again for any rate above 2 kHz.
#[inline]
pub fn frames_for_ms(ms: u64, sample_rate: u32) -> usize {
    (ms as u128 * sample_rate as u128 / 1000) as usize
}

/// Calculate the RMS level of an audio buffer in dBFS
///
/// Returns -f32::INFINITY for empty or silent buffers.
pub fn calculate_rms(buffer: &AudioBuffer) -> f32 {
    let total_samples = buffer.channels() * buffer.len();
    if total_samples == 0 {
        return f32::NEG_INFINITY;
    }

    let sum_squares: f64 = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();

    let rms = (sum_squares / total_samples as f64).sqrt() as f32;
    linear_to_db(rms)
}

/// Calculate the peak level of an audio buffer in dBFS
///
/// Returns -f32::INFINITY for empty buffers.
pub fn calculate_peak(buffer: &AudioBuffer) -> f32 {
    let peak = buffer
        .samples
        .iter()
        .flat_map(|channel| channel.iter())
        .map(|&s| s.abs())
        .fold(0.0_f32, f32::max);

    linear_to_db(peak)
}

// ============================================================================
// Channel Layout
// ============================================================================

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Decoded audio: per-channel samples plus the rate they play at.
///
/// # Example
/// ```
/// use spotmix::engine::{AudioBuffer, ChannelLayout};
///
/// let silence = AudioBuffer::silent(1500, 48000, ChannelLayout::Stereo);
/// assert_eq!(silence.duration_ms(), 1500);
/// assert_eq!(silence.slice(500, 10_000).duration_ms(), 1000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer of `num_frames` frames
    pub fn new(num_frames: usize, layout: ChannelLayout, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_frames]; layout.num_channels()],
            sample_rate,
        }
    }

    /// A buffer with no frames
    pub fn empty(sample_rate: u32, layout: ChannelLayout) -> Self {
        Self::new(0, layout, sample_rate)
    }

    /// `duration_ms` milliseconds of digital silence
    pub fn silent(duration_ms: u64, sample_rate: u32, layout: ChannelLayout) -> Self {
        Self::new(frames_for_ms(duration_ms, sample_rate), layout, sample_rate)
    }

    /// Build a buffer from per-channel sample vectors
    ///
    /// Rejects zero sample rates, channel counts other than 1 or 2, and
    /// channels of unequal length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SpotmixError::InvalidAudio {
                reason: "sample rate must be positive".to_string(),
                source: None,
            });
        }
        if ChannelLayout::from_count(samples.len()).is_none() {
            return Err(SpotmixError::UnsupportedFormat {
                format: format!("{}-channel audio (only mono/stereo supported)", samples.len()),
            });
        }
        let frames = samples[0].len();
        if samples.iter().any(|ch| ch.len() != frames) {
            return Err(SpotmixError::InvalidAudio {
                reason: "channels have different lengths".to_string(),
                source: None,
            });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create an audio buffer from interleaved sample data
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.len() % num_channels != 0 {
            return Err(SpotmixError::InvalidAudio {
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self::from_channels(samples, sample_rate)
    }

    /// Convert the buffer to interleaved format (L, R, L, R, ... for stereo)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());

        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the channel layout
    #[inline]
    pub fn layout(&self) -> ChannelLayout {
        ChannelLayout::from_count(self.channels()).unwrap_or_default()
    }

    /// Get the number of frames (samples per channel)
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no frames)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Duration in whole milliseconds, rounded to nearest
    #[inline]
    pub fn duration_ms(&self) -> u64 {
        ((self.len() as u128 * 1000 + self.sample_rate as u128 / 2) / self.sample_rate as u128)
            as u64
    }

    /// Immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get a sample at the specified channel and frame
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// RMS level over all channels in dBFS
    pub fn rms_dbfs(&self) -> f32 {
        calculate_rms(self)
    }

    // ------------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------------

    /// Frames `[start, end)`, clamped to the buffer
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioBuffer {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            samples: self
                .samples
                .iter()
                .map(|ch| ch[start..end].to_vec())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Sub-range `[start_ms, end_ms)`, clamped to the buffer
    pub fn slice(&self, start_ms: u64, end_ms: u64) -> AudioBuffer {
        self.slice_frames(
            frames_for_ms(start_ms, self.sample_rate),
            frames_for_ms(end_ms, self.sample_rate),
        )
    }

    /// Everything from `start_ms` to the end
    pub fn slice_from(&self, start_ms: u64) -> AudioBuffer {
        self.slice_frames(frames_for_ms(start_ms, self.sample_rate), self.len())
    }

    /// Frames from each `[start, end)` range, in order, as one buffer
    ///
    /// Ranges are clamped to the buffer. The output is allocated once.
    pub fn select_frames(&self, ranges: &[(usize, usize)]) -> AudioBuffer {
        let len = self.len();
        let clamped: Vec<(usize, usize)> = ranges
            .iter()
            .map(|&(start, end)| (start.min(len), end.min(len)))
            .filter(|(start, end)| start < end)
            .collect();
        let total: usize = clamped.iter().map(|(start, end)| end - start).sum();

        let samples = self
            .samples
            .iter()
            .map(|ch| {
                let mut selected = Vec::with_capacity(total);
                for &(start, end) in &clamped {
                    selected.extend_from_slice(&ch[start..end]);
                }
                selected
            })
            .collect();
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// This buffer followed by `other`
    ///
    /// `other` is converted to this buffer's rate and channel layout first.
    pub fn concat(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        let other = other.conform(self.sample_rate, self.layout())?;
        let samples = self
            .samples
            .iter()
            .zip(other.samples.iter())
            .map(|(head, tail)| {
                let mut joined = Vec::with_capacity(head.len() + tail.len());
                joined.extend_from_slice(head);
                joined.extend_from_slice(tail);
                joined
            })
            .collect();
        Ok(Self {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    /// The buffer played `times` times back to back, with hard cuts
    pub fn repeat(&self, times: usize) -> AudioBuffer {
        Self {
            samples: self.samples.iter().map(|ch| ch.repeat(times)).collect(),
            sample_rate: self.sample_rate,
        }
    }

    /// Uniform level shift of `gain_db` decibels
    pub fn gain(&self, gain_db: f32) -> AudioBuffer {
        let gain_linear = db_to_linear(gain_db);
        self.map_samples(|_, sample| sample * gain_linear)
    }

    /// Linear ramp from silence over the first `duration_ms`
    ///
    /// A window longer than the buffer is clamped to the buffer.
    pub fn fade_in(&self, duration_ms: u64) -> AudioBuffer {
        let window = frames_for_ms(duration_ms, self.sample_rate).min(self.len());
        if window == 0 {
            return self.clone();
        }
        self.map_samples(|frame, sample| {
            if frame < window {
                sample * (frame as f32 / window as f32)
            } else {
                sample
            }
        })
    }

    /// Linear ramp to silence over the last `duration_ms`
    ///
    /// A window longer than the buffer is clamped to the buffer.
    pub fn fade_out(&self, duration_ms: u64) -> AudioBuffer {
        let len = self.len();
        let window = frames_for_ms(duration_ms, self.sample_rate).min(len);
        if window == 0 {
            return self.clone();
        }
        let start = len - window;
        self.map_samples(|frame, sample| {
            if frame >= start {
                let t = (frame - start + 1) as f32 / window as f32;
                sample * (1.0 - t)
            } else {
                sample
            }
        })
    }

    /// Same audio at `sample_rate`, preserving duration in time
    pub fn resample(&self, sample_rate: u32) -> Result<AudioBuffer> {
        if sample_rate == self.sample_rate {
            return Ok(self.clone());
        }
        Ok(Self {
            samples: resample_channels(&self.samples, self.sample_rate, sample_rate)?,
            sample_rate,
        })
    }

    /// Same audio at `sample_rate` with `layout`
    pub fn conform(&self, sample_rate: u32, layout: ChannelLayout) -> Result<AudioBuffer> {
        Ok(self.resample(sample_rate)?.with_layout(layout))
    }

    /// Convert between mono and stereo
    ///
    /// Mono is duplicated to both sides; stereo is averaged down.
    pub fn with_layout(&self, layout: ChannelLayout) -> AudioBuffer {
        if layout == self.layout() {
            return self.clone();
        }
        let samples = match layout {
            ChannelLayout::Stereo => vec![self.samples[0].clone(), self.samples[0].clone()],
            ChannelLayout::Mono => vec![self.samples[0]
                .iter()
                .zip(self.samples[1].iter())
                .map(|(l, r)| (l + r) * 0.5)
                .collect()],
        };
        Self {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    /// Append trailing silence until the buffer lasts `duration_ms`
    ///
    /// Buffers already that long are returned unchanged.
    pub fn pad_to_ms(&self, duration_ms: u64) -> AudioBuffer {
        let target = frames_for_ms(duration_ms, self.sample_rate);
        if self.len() >= target {
            return self.clone();
        }
        self.with_len(target)
    }

    /// Append `pause_ms` of silence
    pub fn append_silence(&self, pause_ms: u64) -> AudioBuffer {
        self.with_len(self.len() + frames_for_ms(pause_ms, self.sample_rate))
    }

    /// Truncate or pad so the buffer lasts exactly `duration_ms`
    pub fn fit_to_ms(&self, duration_ms: u64) -> AudioBuffer {
        self.with_len(frames_for_ms(duration_ms, self.sample_rate))
    }

    /// Additive mix of `other` over this buffer's span
    ///
    /// The result keeps this buffer's length, rate and layout; the part of
    /// `other` past the end is dropped.
    pub fn overlay(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        let other = other.conform(self.sample_rate, self.layout())?;
        let mut mixed = self.clone();
        for (dst, src) in mixed.samples.iter_mut().zip(other.samples.iter()) {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d += *s;
            }
        }
        Ok(mixed)
    }

    fn with_len(&self, frames: usize) -> AudioBuffer {
        Self {
            samples: self
                .samples
                .iter()
                .map(|ch| {
                    let mut resized = ch[..frames.min(ch.len())].to_vec();
                    resized.resize(frames, 0.0);
                    resized
                })
                .collect(),
            sample_rate: self.sample_rate,
        }
    }

    fn map_samples(&self, f: impl Fn(usize, f32) -> f32) -> AudioBuffer {
        Self {
            samples: self
                .samples
                .iter()
                .map(|ch| ch.iter().enumerate().map(|(i, &s)| f(i, s)).collect())
                .collect(),
            sample_rate: self.sample_rate,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
