//! Duration Synchronization
//!
//! Loops or truncates a music bed to an exact length. Loop seams are hard
//! cuts; no crossfade is applied.

use tracing::debug;

use crate::engine::buffer::{frames_for_ms, AudioBuffer};
use crate::error::{Result, SpotmixError};

/// Loop or truncate `music` so it lasts exactly `target_ms`
///
/// Shorter music is repeated whole `ceil(target / music)` times and then cut
/// to the target; longer music is cut directly.
///
/// # Errors
/// * `InvalidAudio` - If `music` is empty and `target_ms` is not zero
pub fn synchronize(music: &AudioBuffer, target_ms: u64) -> Result<AudioBuffer> {
    if target_ms == 0 {
        return Ok(AudioBuffer::empty(music.sample_rate(), music.layout()));
    }
    if music.is_empty() {
        return Err(SpotmixError::InvalidAudio {
            reason: format!("Cannot loop empty music to {} ms", target_ms),
            source: None,
        });
    }

    let target_frames = frames_for_ms(target_ms, music.sample_rate());
    let synced = if music.len() < target_frames {
        let times = target_frames.div_ceil(music.len());
        debug!(
            "Looping {} ms of music {} times to reach {} ms",
            music.duration_ms(),
            times,
            target_ms
        );
        music.repeat(times).slice_frames(0, target_frames)
    } else {
        debug!(
            "Truncating {} ms of music to {} ms",
            music.duration_ms(),
            target_ms
        );
        music.slice_frames(0, target_frames)
    };

    Ok(synced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::io::{generate_stereo_test_tone, generate_test_tone};

    #[test]
    fn test_short_music_is_looped() {
        let music = generate_stereo_test_tone(220.0, 330.0, 0.4, 3000, 44100);
        let synced = synchronize(&music, 8000).unwrap();

        assert_eq!(synced.duration_ms(), 8000);
        assert_eq!(synced.channels(), 2);
        // First pass bit-matches the source
        assert_eq!(synced.slice_frames(0, music.len()), music);
        // Second pass restarts with a hard cut
        assert_eq!(
            synced.slice_frames(music.len(), 2 * music.len()),
            music
        );
    }

    #[test]
    fn test_long_music_is_prefix() {
        let music = generate_test_tone(220.0, 0.4, 10_000, 22050);
        let synced = synchronize(&music, 4321).unwrap();

        assert_eq!(synced.duration_ms(), 4321);
        assert_eq!(synced, music.slice_frames(0, synced.len()));
    }

    #[test]
    fn test_equal_length_is_unchanged() {
        let music = generate_test_tone(220.0, 0.4, 5000, 44100);
        assert_eq!(synchronize(&music, 5000).unwrap(), music);
    }

    #[test]
    fn test_zero_target() {
        let music = generate_test_tone(220.0, 0.4, 5000, 44100);
        let synced = synchronize(&music, 0).unwrap();
        assert!(synced.is_empty());
    }

    #[test]
    fn test_empty_music() {
        let empty = AudioBuffer::empty(44100, ChannelLayout::Stereo);
        assert!(synchronize(&empty, 1000).is_err());
        assert!(synchronize(&empty, 0).unwrap().is_empty());
    }

    #[test]
    fn test_music_not_dividing_target() {
        let music = generate_test_tone(220.0, 0.4, 700, 48000);
        let synced = synchronize(&music, 2000).unwrap();
        assert_eq!(synced.duration_ms(), 2000);
    }
}
