//! Assembly Stages
//!
//! The fixed transforms a spot is built from. Each stage takes buffers and
//! returns a new buffer; none of them touches storage or the network.
//! Typical order: silence stripping per segment, stitching, music
//! synchronization, then mixing. Tempo adjustment runs on speech before
//! it is mixed.

mod mix;
mod silence;
mod stitch;
mod sync;
mod tempo;

pub use mix::{
    mix, mix_and_encode, validate_volume, volume_to_gain_db, MixRequest, MUSIC_FADE_MS,
};
pub use silence::{SilenceStripper, DEFAULT_MIN_SILENCE_MS, DEFAULT_SILENCE_THRESHOLD_DB};
pub use stitch::{stitch, PauseSeconds, Section};
pub use sync::synchronize;
pub use tempo::{adjust_tempo, SoundStretch, SpeechRate, TempoChange, TimeStretcher};
