//! Mix Engine
//!
//! Lays a music bed under a voiceover:
//! 1. Validate volume and target length
//! 2. Bring music to the voice's sample rate and layout
//! 3. Fit both to exactly the target length
//! 4. Attenuate music by `volume * 30 - 30` dB
//! 5. Fade music in and out over 5 s (clamped to the bed)
//! 6. Sum voice and music
//! 7. Encode (192 kbps when lossy)
//!
//! Failures after validation are tagged with the stage that raised them.
//! Music is expected to be synchronized to the target beforehand; a short
//! bed is padded with silence here, never looped.

use tracing::{debug, info};

use crate::engine::buffer::AudioBuffer;
use crate::engine::encode::Encoder;
use crate::error::{MixStage, Result, SpotmixError};

// ============================================================================
// Constants
// ============================================================================

/// Fade-in and fade-out length applied to music
pub const MUSIC_FADE_MS: u64 = 5000;

/// Attenuation range covered by the volume slider in dB
const VOLUME_RANGE_DB: f32 = 30.0;

// ============================================================================
// Volume mapping
// ============================================================================

/// Reject volumes outside `[0, 1]`
pub fn validate_volume(volume: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(SpotmixError::InvalidVolume { volume });
    }
    Ok(())
}

/// Map a music volume in `[0, 1]` to a gain in dB: `volume * 30 - 30`
///
/// Full volume leaves music untouched; zero attenuates it by 30 dB.
pub fn volume_to_gain_db(volume: f32) -> Result<f32> {
    validate_volume(volume)?;
    Ok(volume * VOLUME_RANGE_DB - VOLUME_RANGE_DB)
}

// ============================================================================
// Mix request
// ============================================================================

/// Everything a single mix needs
#[derive(Debug, Clone)]
pub struct MixRequest {
    /// Output length in seconds, > 0
    pub target_duration_secs: f64,
    /// Music level in `[0, 1]`
    pub music_volume: f32,
    pub voice: AudioBuffer,
    pub music: Option<AudioBuffer>,
}

impl MixRequest {
    pub fn new(
        voice: AudioBuffer,
        music: Option<AudioBuffer>,
        target_duration_secs: f64,
        music_volume: f32,
    ) -> Self {
        Self {
            target_duration_secs,
            music_volume,
            voice,
            music,
        }
    }

    /// Check every field before any transform runs
    ///
    /// Returns the target length in milliseconds and the music gain in dB.
    pub fn validate(&self) -> Result<(u64, f32)> {
        let gain_db = volume_to_gain_db(self.music_volume)?;

        let secs = self.target_duration_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(SpotmixError::InvalidField {
                field: "target_duration",
                reason: format!("must be a positive number of seconds, got {}", secs),
            });
        }
        let target_ms = (secs * 1000.0).round() as u64;
        if target_ms == 0 {
            return Err(SpotmixError::InvalidField {
                field: "target_duration",
                reason: format!("{} s rounds to zero milliseconds", secs),
            });
        }

        Ok((target_ms, gain_db))
    }
}

// ============================================================================
// Mixing
// ============================================================================

/// Run steps 1 to 6 and return the mixed buffer
///
/// The result has the voice's sample rate and layout and lasts exactly the
/// target length. Without music the voice is only fitted to the target.
pub fn mix(request: &MixRequest) -> Result<AudioBuffer> {
    let (target_ms, gain_db) = request.validate()?;
    let voice = &request.voice;

    if !voice.is_finite() {
        return Err(SpotmixError::mix_failed(
            MixStage::LoadVoice,
            SpotmixError::InvalidAudio {
                reason: "voice contains NaN or infinite samples".to_string(),
                source: None,
            },
        ));
    }

    let voice_bed = voice.fit_to_ms(target_ms);
    let Some(music) = &request.music else {
        debug!("No music supplied; fitting voice to {} ms", target_ms);
        return Ok(voice_bed);
    };

    if !music.is_finite() {
        return Err(SpotmixError::mix_failed(
            MixStage::LoadMusic,
            SpotmixError::InvalidAudio {
                reason: "music contains NaN or infinite samples".to_string(),
                source: None,
            },
        ));
    }

    let music_bed = music
        .conform(voice.sample_rate(), voice.layout())
        .map_err(|e| SpotmixError::mix_failed(MixStage::LoadMusic, e))?
        .fit_to_ms(target_ms)
        .gain(gain_db)
        .fade_in(MUSIC_FADE_MS)
        .fade_out(MUSIC_FADE_MS);
    let mixed = voice_bed
        .overlay(&music_bed)
        .map_err(|e| SpotmixError::mix_failed(MixStage::LoadMusic, e))?;

    info!(
        "Mixed {} ms of voice with music at {:.1} dB",
        mixed.duration_ms(),
        gain_db
    );
    Ok(mixed)
}

/// Mix and encode in one step (all seven stages)
///
/// Nothing is returned unless every stage succeeded.
pub fn mix_and_encode(request: &MixRequest, encoder: &dyn Encoder) -> Result<Vec<u8>> {
    let mixed = mix(request)?;
    encoder
        .encode(&mixed)
        .map_err(|e| SpotmixError::mix_failed(MixStage::Export, e))
}
