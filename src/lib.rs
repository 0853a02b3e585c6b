//! Spotmix - Promo Spot Audio Assembly
//!
//! Builds finished promotional clips from synthesized speech and background
//! music.
//!
//! # Architecture
//!
//! - `engine`: immutable PCM buffers, WAV/MP3 decode, encoders
//! - `dsp`: the fixed assembly stages (silence stripping, stitching, music
//!   synchronization, mixing, tempo adjustment)
//! - `services`: speech, storage and music catalog collaborators
//! - `recipes`: the ordered stage lists behind each request type
//!
//! Every stage takes buffers by reference and returns new ones. Requests are
//! single-threaded; concurrent requests share nothing but configuration.

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod ident;
pub mod recipes;
pub mod scratch;
pub mod services;

pub use config::Config;
pub use engine::{AudioBuffer, ChannelLayout};
pub use error::{ErrorCategory, MixStage, Result, SpotmixError};
pub use ident::ContentId;
