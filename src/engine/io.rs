//! WAV file I/O
//!
//! Reads and writes WAV through hound, to files or in-memory byte vectors.
//! Buffers keep the sample rate they were recorded at; conversion happens
//! only where a stage asks for it.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{frames_for_ms, AudioBuffer, ChannelLayout};
use crate::error::{Result, SpotmixError};

/// WAV export configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Target sample rate; `None` keeps the buffer's own rate
    pub sample_rate: Option<u32>,
    /// Bit depth: 16, 24, or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat {
            sample_rate: None,
            bit_depth: 16,
        }
    }
}

impl ExportFormat {
    /// Create a new export format with the given sample rate and bit depth
    pub fn new(sample_rate: Option<u32>, bit_depth: u16) -> Self {
        ExportFormat {
            sample_rate,
            bit_depth,
        }
    }

    /// Lossless scratch format handed to external tools (32-bit float)
    pub fn scratch() -> Self {
        ExportFormat {
            sample_rate: None,
            bit_depth: 32,
        }
    }
}

/// Import a WAV file
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file
/// * `UnsupportedFormat` - If the audio has more than 2 channels
pub fn import_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(SpotmixError::FileNotFound {
            path: path.to_path_buf(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| {
        SpotmixError::invalid_audio(format!("Failed to open {}: {}", path.display(), e), e)
    })?;
    read_wav(reader)
}

/// Decode WAV bytes held in memory
pub fn wav_from_bytes(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| SpotmixError::invalid_audio(format!("Failed to parse WAV: {}", e), e))?;
    read_wav(reader)
}

/// Export an AudioBuffer to a WAV file
pub fn export_wav(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let writer =
        WavWriter::create(path, wav_spec(buffer, format)?).map_err(|e| hound_io_error(&e))?;
    write_wav(writer, buffer, format)
}

/// Encode an AudioBuffer as WAV bytes
pub fn wav_to_bytes(buffer: &AudioBuffer, format: ExportFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let spec = wav_spec(buffer, format)?;
        let writer = WavWriter::new(&mut cursor, spec).map_err(|e| hound_io_error(&e))?;
        write_wav(writer, buffer, format)?;
    }
    Ok(cursor.into_inner())
}

/// Generate a mono sine tone
///
/// Useful for exercising the pipeline without fixture files.
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_ms: u64,
    sample_rate: u32,
) -> AudioBuffer {
    let num_frames = frames_for_ms(duration_ms, sample_rate);
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_frames)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();

    AudioBuffer::from_channels(vec![samples], sample_rate)
        .unwrap_or_else(|_| AudioBuffer::empty(sample_rate, ChannelLayout::Mono))
}

/// Generate a stereo tone with different frequencies per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    amplitude: f32,
    duration_ms: u64,
    sample_rate: u32,
) -> AudioBuffer {
    let left = generate_test_tone(freq_left, amplitude, duration_ms, sample_rate);
    let right = generate_test_tone(freq_right, amplitude, duration_ms, sample_rate);

    AudioBuffer::from_channels(
        vec![left.channel(0).to_vec(), right.channel(0).to_vec()],
        sample_rate,
    )
    .unwrap_or_else(|_| AudioBuffer::empty(sample_rate, ChannelLayout::Stereo))
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn read_wav<R: Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let layout = ChannelLayout::from_count(channels).ok_or_else(|| {
        SpotmixError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        }
    })?;

    let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    AudioBuffer::from_interleaved(&samples, layout, spec.sample_rate)
}

fn wav_spec(buffer: &AudioBuffer, format: ExportFormat) -> Result<WavSpec> {
    if !matches!(format.bit_depth, 16 | 24 | 32) {
        return Err(SpotmixError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", format.bit_depth),
        });
    }
    Ok(WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: format.sample_rate.unwrap_or(buffer.sample_rate()),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    })
}

fn write_wav<W: Write + Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    format: ExportFormat,
) -> Result<()> {
    let interleaved = match format.sample_rate {
        Some(rate) => buffer.resample(rate)?.to_interleaved(),
        None => buffer.to_interleaved(),
    };

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(|e| hound_io_error(&e))?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(|e| hound_io_error(&e))?;
            }
        }
        32 => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(|e| hound_io_error(&e))?;
            }
        }
        _ => unreachable!("bit depth validated by wav_spec"),
    }

    writer.finalize().map_err(|e| hound_io_error(&e))
}

fn hound_io_error(e: &hound::Error) -> SpotmixError {
    SpotmixError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        e.to_string(),
    ))
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let read_err = |e: hound::Error| SpotmixError::invalid_audio("Failed to read samples", e);

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(read_err),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(SpotmixError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", bits_per_sample),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(read_err)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(440.0, 1.0, 1000, 48000);

        assert_eq!(buffer.len(), 48000);
        assert_eq!(buffer.channels(), 1);

        // Half a cycle in, the sine is back near zero
        let zero_crossing = (48000.0 / 440.0 / 2.0) as usize;
        assert!(buffer.channel(0)[zero_crossing].abs() < 0.1);
    }

    #[test]
    fn test_generate_stereo_test_tone() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 1.0, 500, 48000);

        assert_eq!(buffer.len(), 24000);
        assert_eq!(buffer.channels(), 2);
        assert!((buffer.channel(0)[100] - buffer.channel(1)[100]).abs() > 0.01);
    }

    #[test]
    fn test_round_trip_mono_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let original = generate_test_tone(440.0, 0.8, 500, 44100);

        export_wav(&original, &path, ExportFormat::new(None, 24)).unwrap();
        let imported = import_wav(&path).unwrap();

        assert_eq!(imported.len(), original.len());
        assert_eq!(imported.sample_rate(), 44100);
        for (orig, imp) in original.channel(0).iter().zip(imported.channel(0)) {
            assert!((orig - imp).abs() < 0.001, "{} vs {}", orig, imp);
        }
    }

    #[test]
    fn test_round_trip_stereo_bytes() {
        let original = generate_stereo_test_tone(440.0, 880.0, 0.5, 250, 48000);

        let bytes = wav_to_bytes(&original, ExportFormat::default()).unwrap();
        let imported = wav_from_bytes(&bytes).unwrap();

        assert_eq!(imported.channels(), 2);
        assert_eq!(imported.duration_ms(), 250);
        for ch in 0..2 {
            for (orig, imp) in original.channel(ch).iter().zip(imported.channel(ch)) {
                assert!((orig - imp).abs() < 0.001);
            }
        }
    }

    #[test]
    fn test_round_trip_32bit_float() {
        let original = generate_test_tone(1000.0, 0.9, 200, 48000);
        let bytes = wav_to_bytes(&original, ExportFormat::scratch()).unwrap();
        let imported = wav_from_bytes(&bytes).unwrap();

        assert_eq!(imported, original);
    }

    #[test]
    fn test_export_with_resample_keeps_duration() {
        let original = generate_test_tone(440.0, 0.5, 750, 48000);
        let bytes = wav_to_bytes(&original, ExportFormat::new(Some(22050), 16)).unwrap();
        let imported = wav_from_bytes(&bytes).unwrap();

        assert_eq!(imported.sample_rate(), 22050);
        assert_eq!(imported.duration_ms(), 750);
    }

    #[test]
    fn test_empty_buffer_round_trip() {
        let empty = AudioBuffer::empty(44100, ChannelLayout::Stereo);
        let bytes = wav_to_bytes(&empty, ExportFormat::default()).unwrap();
        let imported = wav_from_bytes(&bytes).unwrap();
        assert!(imported.is_empty());
        assert_eq!(imported.duration_ms(), 0);
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let tone = generate_test_tone(440.0, 0.5, 10, 48000);
        let result = wav_to_bytes(&tone, ExportFormat::new(None, 12));
        assert!(matches!(result, Err(SpotmixError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_import_nonexistent_file() {
        match import_wav(Path::new("/nonexistent/path/audio.wav")) {
            Err(SpotmixError::FileNotFound { path, .. }) => {
                assert!(path.to_string_lossy().contains("nonexistent"));
            }
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_bytes_are_invalid_audio() {
        let result = wav_from_bytes(b"definitely not a riff header");
        assert!(matches!(result, Err(SpotmixError::InvalidAudio { .. })));
    }
}
