//! Collaborators the recipes call into
//!
//! Speech synthesis, object storage and the music catalog sit behind
//! traits so recipes can run against local or in-memory stand-ins.

pub mod music;
pub mod speech;
pub mod storage;
pub mod voice;

#[cfg(feature = "catalog-http")]
pub use music::HttpMusicFetcher;
pub use music::{track_url, MusicFetcher, MusicLibrary};
pub use speech::{SpeechSource, SynthesisRequest};
pub use storage::{LocalObjectStore, MemoryObjectStore, ObjectStore};
pub use voice::VoiceResolver;
