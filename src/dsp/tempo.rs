//! Tempo Adjustment
//!
//! Speeds speech up or slows it down without changing pitch. The stretch
//! itself is delegated to a [`TimeStretcher`]; production uses the
//! SoundTouch `soundstretch` tool.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::buffer::AudioBuffer;
use crate::engine::io::{export_wav, import_wav, ExportFormat};
use crate::engine::tool::run_tool;
use crate::error::Result;

// ============================================================================
// Tempo change
// ============================================================================

/// Signed tempo change in percent (+25 plays 25% faster)
///
/// Fractional percents are kept as given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange(f64);

impl TempoChange {
    /// A change of `percent`; exactly zero is no change and gives `None`,
    /// as does a non-finite value
    pub fn from_percent(percent: f64) -> Option<Self> {
        (percent.is_finite() && percent != 0.0).then_some(Self(percent))
    }

    /// Look up a named rate preset such as `1.5X` (case-insensitive)
    ///
    /// Unknown presets mean no change.
    pub fn from_preset(preset: &str) -> Option<Self> {
        let percent = match preset.trim().to_ascii_uppercase().as_str() {
            "1.25X" => 25.0,
            "1.5X" => 50.0,
            "1.75X" => 75.0,
            "2X" => 100.0,
            _ => return None,
        };
        Some(Self(percent))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// The `soundstretch` tempo option for this change
    pub fn tempo_arg(self) -> String {
        format!("-tempo={}", self.0)
    }
}

impl fmt::Display for TempoChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.0)
    }
}

/// Speech rate as it arrives in a request: a percent or a preset name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpeechRate {
    Percent(f64),
    Preset(String),
}

impl SpeechRate {
    pub fn resolve(&self) -> Option<TempoChange> {
        match self {
            SpeechRate::Percent(percent) => TempoChange::from_percent(*percent),
            SpeechRate::Preset(name) => TempoChange::from_preset(name),
        }
    }
}

// ============================================================================
// Time stretching
// ============================================================================

/// Pitch-preserving time stretch
pub trait TimeStretcher {
    /// Change the tempo of `buffer` by `change`
    ///
    /// Blocks until done.
    fn stretch(&self, buffer: &AudioBuffer, change: TempoChange) -> Result<AudioBuffer>;
}

/// `soundstretch` run on temporary WAV files
#[derive(Debug, Clone)]
pub struct SoundStretch {
    binary: PathBuf,
}

impl SoundStretch {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SoundStretch {
    fn default() -> Self {
        Self::new("soundstretch")
    }
}

impl TimeStretcher for SoundStretch {
    fn stretch(&self, buffer: &AudioBuffer, change: TempoChange) -> Result<AudioBuffer> {
        // Dropped (and deleted) on every return path
        let scratch = tempfile::Builder::new().prefix("spotmix-tempo-").tempdir()?;
        let input = scratch.path().join("input.wav");
        let output = scratch.path().join("output.wav");

        export_wav(buffer, &input, ExportFormat::default())?;
        run_tool(
            "soundstretch",
            Command::new(&self.binary)
                .arg(&input)
                .arg(&output)
                .arg(change.tempo_arg()),
        )?;

        import_wav(&output)
    }
}

/// Apply an optional tempo change
///
/// `None` returns the input untouched without invoking the stretcher. The
/// stretched audio is brought back to the input's sample rate and layout.
pub fn adjust_tempo(
    buffer: &AudioBuffer,
    change: Option<TempoChange>,
    stretcher: &dyn TimeStretcher,
) -> Result<AudioBuffer> {
    let Some(change) = change else {
        debug!("No tempo change requested");
        return Ok(buffer.clone());
    };

    let stretched = stretcher
        .stretch(buffer, change)?
        .conform(buffer.sample_rate(), buffer.layout())?;

    info!(
        "Tempo {}: {} ms -> {} ms",
        change,
        buffer.duration_ms(),
        stretched.duration_ms()
    );
    Ok(stretched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use crate::engine::io::generate_test_tone;
    use crate::error::SpotmixError;
    use std::cell::Cell;
    use test_case::test_case;

    /// Drops frames to fake a speed-up and reports a different rate
    struct FakeStretcher {
        calls: Cell<usize>,
        output_rate: u32,
    }

    impl FakeStretcher {
        fn new(output_rate: u32) -> Self {
            Self {
                calls: Cell::new(0),
                output_rate,
            }
        }
    }

    impl TimeStretcher for FakeStretcher {
        fn stretch(&self, buffer: &AudioBuffer, change: TempoChange) -> Result<AudioBuffer> {
            self.calls.set(self.calls.get() + 1);
            let keep_ms =
                (buffer.duration_ms() as f64 * 100.0 / (100.0 + change.percent())).round() as u64;
            buffer.slice(0, keep_ms).resample(self.output_rate)
        }
    }

    #[test_case("1.25X", Some(25.0) ; "preset 1.25")]
    #[test_case("1.5x", Some(50.0) ; "lowercase preset")]
    #[test_case("1.75X", Some(75.0) ; "preset 1.75")]
    #[test_case("2X", Some(100.0) ; "double speed")]
    #[test_case("3X", None ; "unknown preset")]
    #[test_case("", None ; "empty preset")]
    fn test_preset_lookup(preset: &str, expected: Option<f64>) {
        assert_eq!(TempoChange::from_preset(preset).map(TempoChange::percent), expected);
    }

    #[test]
    fn test_zero_percent_is_no_change() {
        assert_eq!(TempoChange::from_percent(0.0), None);
        assert_eq!(TempoChange::from_percent(f64::NAN), None);
        assert_eq!(TempoChange::from_percent(-10.0).map(|c| c.percent()), Some(-10.0));
    }

    #[test]
    fn test_speech_rate_deserializes_both_forms() {
        let percent: SpeechRate = serde_json::from_str("25").unwrap();
        let fractional: SpeechRate = serde_json::from_str("-9.6").unwrap();
        let preset: SpeechRate = serde_json::from_str("\"1.5X\"").unwrap();
        assert_eq!(percent.resolve(), TempoChange::from_percent(25.0));
        assert_eq!(preset.resolve(), TempoChange::from_percent(50.0));
        assert_eq!(fractional.resolve().map(TempoChange::percent), Some(-9.6));
        assert_eq!(SpeechRate::Percent(0.0).resolve(), None);
    }

    #[test]
    fn test_small_fractional_rates_are_kept() {
        assert_eq!(SpeechRate::Percent(0.4).resolve().map(TempoChange::percent), Some(0.4));
        assert_eq!(SpeechRate::Percent(12.5).resolve().map(TempoChange::percent), Some(12.5));
        assert_eq!(TempoChange::from_percent(12.5).unwrap().tempo_arg(), "-tempo=12.5");
        assert_eq!(TempoChange::from_percent(25.0).unwrap().tempo_arg(), "-tempo=25");
    }

    #[test]
    fn test_display() {
        assert_eq!(TempoChange::from_preset("2X").unwrap().to_string(), "+100%");
        assert_eq!(TempoChange::from_percent(-10.0).unwrap().to_string(), "-10%");
        assert_eq!(TempoChange::from_percent(12.5).unwrap().to_string(), "+12.5%");
    }

    #[test]
    fn test_no_change_skips_stretcher() {
        let voice = generate_test_tone(220.0, 0.5, 2000, 44100);
        let stretcher = FakeStretcher::new(44100);

        let out = adjust_tempo(&voice, TempoChange::from_percent(0.0), &stretcher).unwrap();

        assert_eq!(stretcher.calls.get(), 0);
        assert_eq!(out, voice);
    }

    #[test]
    fn test_rate_forced_back_to_input() {
        let voice = generate_test_tone(220.0, 0.5, 2000, 44100);
        let stretcher = FakeStretcher::new(22050);

        let out = adjust_tempo(&voice, TempoChange::from_preset("2X"), &stretcher).unwrap();

        assert_eq!(stretcher.calls.get(), 1);
        assert_eq!(out.sample_rate(), 44100);
        assert_eq!(out.duration_ms(), 1000);
        assert_eq!(out.layout(), ChannelLayout::Mono);
    }

    #[test]
    fn test_missing_soundstretch() {
        let voice = generate_test_tone(220.0, 0.5, 200, 44100);
        let stretcher = SoundStretch::new("/nonexistent/soundstretch");
        let change = TempoChange::from_percent(25.0).unwrap();

        let result = stretcher.stretch(&voice, change);
        assert!(matches!(result, Err(SpotmixError::ToolUnavailable { .. })));
    }
}
