//! Audio Engine Module
//!
//! Buffer primitives and the ways audio enters and leaves them:
//! - Immutable PCM buffers with slice/concat/gain/fade/overlay transforms
//! - WAV I/O through hound, compressed input through symphonia
//! - Encoders for delivery (WAV in-process, MP3 through ffmpeg)

pub mod buffer;
pub mod decode;
pub mod encode;
pub mod io;
mod resample;
pub(crate) mod tool;

pub use buffer::{
    db_to_linear, frames_for_ms, linear_to_db, AudioBuffer, ChannelLayout, DEFAULT_SAMPLE_RATE,
};
pub use decode::{decode_bytes, decode_file};
pub use encode::{
    encoder_for_path, write_to_file, Encoder, Mp3Encoder, WavEncoder, EXPORT_BITRATE_KBPS,
};
pub use io::{
    export_wav, generate_stereo_test_tone, generate_test_tone, import_wav, wav_from_bytes,
    wav_to_bytes, ExportFormat,
};
