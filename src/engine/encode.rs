//! Serializing buffers for delivery
//!
//! Lossy output is always 192 kbps MP3, produced by an external ffmpeg
//! process. WAV is encoded in-process.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::io::{export_wav, wav_to_bytes, ExportFormat};
use crate::engine::tool::run_tool;
use crate::error::{Result, SpotmixError};

/// Fixed bitrate of every lossy export
pub const EXPORT_BITRATE_KBPS: u32 = 192;

/// Turns a buffer into encoded bytes of one container format
pub trait Encoder {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    /// MIME type used for storage uploads
    fn content_type(&self) -> &'static str;

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>>;
}

/// Lossless WAV encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder {
    pub format: ExportFormat,
}

impl Encoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn content_type(&self) -> &'static str {
        "audio/wav"
    }

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>> {
        wav_to_bytes(buffer, self.format)
    }
}

/// MP3 encoder backed by ffmpeg/libmp3lame at 192 kbps
#[derive(Debug, Clone)]
pub struct Mp3Encoder {
    ffmpeg_path: PathBuf,
}

impl Mp3Encoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Default for Mp3Encoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Encoder for Mp3Encoder {
    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }

    fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>> {
        let input = tempfile::Builder::new()
            .prefix("spotmix-enc-")
            .suffix(".wav")
            .tempfile()?;
        export_wav(buffer, input.path(), ExportFormat::default())?;

        let output = run_tool(
            "ffmpeg",
            Command::new(&self.ffmpeg_path)
                .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
                .arg(input.path())
                .args(["-codec:a", "libmp3lame"])
                .args(["-b:a", &format!("{}k", EXPORT_BITRATE_KBPS)])
                .args(["-f", "mp3", "-"]),
        )?;

        debug!(
            "Encoded {} ms to {} bytes of MP3",
            buffer.duration_ms(),
            output.stdout.len()
        );
        Ok(output.stdout)
    }
}

/// Pick an encoder from a file extension
pub fn encoder_for_path(path: &Path, ffmpeg_path: &Path) -> Result<Box<dyn Encoder>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") => Ok(Box::new(WavEncoder::default())),
        Some("mp3") => Ok(Box::new(Mp3Encoder::new(ffmpeg_path))),
        other => Err(SpotmixError::UnsupportedFormat {
            format: other.unwrap_or("(none)").to_string(),
        }),
    }
}

/// Encode a buffer and write it to `path`
///
/// The bytes go to a temporary file beside the destination, which is renamed
/// into place only once everything succeeded.
pub fn write_to_file(encoder: &dyn Encoder, buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let bytes = encoder.encode(buffer)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&bytes)?;
    staged.flush()?;
    staged.persist(path).map_err(|e| SpotmixError::Io(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
