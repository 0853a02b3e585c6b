//! Segment Stitching
//!
//! Joins voiceover sections in order, each followed by its pause.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::buffer::{frames_for_ms, AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE};
use crate::error::Result;

/// One voiceover segment and the pause that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub voice: AudioBuffer,
    pub pause_ms: u64,
}

impl Section {
    pub fn new(voice: AudioBuffer, pause_ms: u64) -> Self {
        Self { voice, pause_ms }
    }

    /// Voice duration plus pause
    pub fn duration_ms(&self) -> u64 {
        self.voice.duration_ms() + self.pause_ms
    }
}

/// Pause after a section as sent by clients, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PauseSeconds(pub f64);

impl PauseSeconds {
    /// Milliseconds, rounded; negative or non-finite pauses count as zero
    pub fn as_ms(self) -> u64 {
        if self.0.is_finite() && self.0 > 0.0 {
            (self.0 * 1000.0).round() as u64
        } else {
            0
        }
    }
}

/// Concatenate sections in order, appending each section's pause
///
/// The result plays at the first section's sample rate and layout and lasts
/// exactly the sum of every voice duration and pause. No sections gives an
/// empty buffer. The output is built in a single pass.
///
/// # Errors
/// * `InvalidAudio` - If a section cannot be converted to the first
///   section's sample rate
pub fn stitch(sections: &[Section]) -> Result<AudioBuffer> {
    let Some(first) = sections.first() else {
        return Ok(AudioBuffer::empty(
            DEFAULT_SAMPLE_RATE,
            ChannelLayout::default(),
        ));
    };

    let rate = first.voice.sample_rate();
    let layout = first.voice.layout();
    let total_ms: u64 = sections.iter().map(Section::duration_ms).sum();
    let capacity = frames_for_ms(total_ms, rate);

    let mut channels: Vec<Vec<f32>> = (0..layout.num_channels())
        .map(|_| Vec::with_capacity(capacity))
        .collect();
    for section in sections {
        let voice = section.voice.conform(rate, layout)?;
        let pause_frames = frames_for_ms(section.pause_ms, rate);
        for (ch, samples) in channels.iter_mut().enumerate() {
            samples.extend_from_slice(voice.channel(ch));
            samples.resize(samples.len() + pause_frames, 0.0);
        }
    }

    debug!("Stitched {} sections into {} ms", sections.len(), total_ms);

    // Absorb per-section rounding so the total is exact
    Ok(AudioBuffer::from_channels(channels, rate)?.fit_to_ms(total_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    #[test]
    fn test_zero_sections() {
        let stitched = stitch(&[]).unwrap();
        assert!(stitched.is_empty());
        assert_eq!(stitched.duration_ms(), 0);
    }

    #[test]
    fn test_duration_is_sum_of_voice_and_pause() {
        let sections = vec![
            Section::new(generate_test_tone(440.0, 0.5, 1200, 44100), 300),
            Section::new(generate_test_tone(330.0, 0.5, 750, 44100), 0),
            Section::new(generate_test_tone(220.0, 0.5, 2000, 44100), 1500),
        ];

        let stitched = stitch(&sections).unwrap();
        assert_eq!(stitched.duration_ms(), 1200 + 300 + 750 + 2000 + 1500);
    }

    #[test]
    fn test_order_and_pause_placement() {
        let a = AudioBuffer::from_channels(vec![vec![0.25; 480]], 48000).unwrap();
        let b = AudioBuffer::from_channels(vec![vec![-0.5; 480]], 48000).unwrap();

        let stitched = stitch(&[Section::new(a, 10), Section::new(b, 0)]).unwrap();

        assert_eq!(stitched.len(), 480 + 480 + 480);
        assert_eq!(stitched.get_sample(0, 0), Some(0.25));
        assert_eq!(stitched.get_sample(0, 479), Some(0.25));
        assert_eq!(stitched.get_sample(0, 480), Some(0.0));
        assert_eq!(stitched.get_sample(0, 959), Some(0.0));
        assert_eq!(stitched.get_sample(0, 960), Some(-0.5));
    }

    #[test]
    fn test_mixed_rates_use_first_rate() {
        let sections = vec![
            Section::new(generate_test_tone(440.0, 0.5, 500, 48000), 100),
            Section::new(generate_test_tone(440.0, 0.5, 700, 22050), 200),
        ];

        let stitched = stitch(&sections).unwrap();
        assert_eq!(stitched.sample_rate(), 48000);
        assert_eq!(stitched.duration_ms(), 1500);
    }

    #[test]
    fn test_many_short_sections() {
        let sections: Vec<Section> = (0..400)
            .map(|i| {
                let voice = AudioBuffer::from_channels(vec![vec![i as f32 / 400.0; 441]], 44100)
                    .unwrap();
                Section::new(voice, 5)
            })
            .collect();

        let stitched = stitch(&sections).unwrap();

        assert_eq!(stitched.duration_ms(), 400 * 15);
        let stride = 441 + frames_for_ms(5, 44100);
        assert_eq!(stitched.get_sample(0, 399 * stride), Some(399.0 / 400.0));
        assert_eq!(stitched.get_sample(0, 399 * stride + 441), Some(0.0));
    }

    #[test]
    fn test_pause_seconds_conversion() {
        assert_eq!(PauseSeconds(0.8).as_ms(), 800);
        assert_eq!(PauseSeconds(2.5).as_ms(), 2500);
        assert_eq!(PauseSeconds(-2.0).as_ms(), 0);
        assert_eq!(PauseSeconds(f64::NAN).as_ms(), 0);
    }
}
