//! Decoding of encoded audio (MP3 from speech synthesis and storage)
//!
//! RIFF/WAV input goes through hound; everything else is detected by
//! symphonia.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::io::wav_from_bytes;
use crate::error::{Result, SpotmixError};

/// Decode an encoded audio payload into a buffer
///
/// `extension` is a format hint such as `"mp3"`; it may be omitted.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
    if bytes.starts_with(b"RIFF") {
        return wav_from_bytes(&bytes);
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SpotmixError::invalid_audio("Unrecognized audio container", e))?;
    let mut format = detected.format;

    let track = format
        .default_track()
        .ok_or_else(|| SpotmixError::InvalidAudio {
            reason: "No audio track found".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| SpotmixError::UnsupportedFormat {
            format: format!("{:?} ({})", codec_params.codec, e),
        })?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count());

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(SpotmixError::invalid_audio("Failed to read packet", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt frame is skipped, as players do
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!("Skipping undecodable packet: {}", reason);
                continue;
            }
            Err(e) => return Err(SpotmixError::invalid_audio("Failed to decode packet", e)),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    let sample_rate = sample_rate.ok_or_else(|| SpotmixError::InvalidAudio {
        reason: "Stream does not declare a sample rate".to_string(),
        source: None,
    })?;
    let channel_count = channels.unwrap_or(1);
    let layout = ChannelLayout::from_count(channel_count).ok_or_else(|| {
        SpotmixError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channel_count),
        }
    })?;

    debug!(
        "Decoded {} frames at {}Hz ({} channels)",
        interleaved.len() / channel_count,
        sample_rate,
        channel_count
    );

    AudioBuffer::from_interleaved(&interleaved, layout, sample_rate)
}

/// Decode an audio file of any supported format
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let bytes = std::fs::read(path).map_err(|e| SpotmixError::FileNotFound {
        path: path.to_path_buf(),
        source: Some(e),
    })?;
    let extension = path.extension().and_then(|e| e.to_str());
    decode_bytes(bytes, extension)
}
