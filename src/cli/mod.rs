//! CLI Module
//!
//! Command-line access to the assembly stages on local files.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spotmix - promo spot audio assembly
#[derive(Parser, Debug)]
#[command(name = "spotmix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON configuration file (defaults to SPOTMIX_* environment variables)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lay a music bed under a voiceover
    #[command(name = "mix")]
    Mix {
        /// Voiceover audio
        voice: PathBuf,

        /// Output file (.wav or .mp3)
        #[arg(short, long)]
        output: PathBuf,

        /// Background music file, or a track name in the music library
        #[arg(short, long)]
        music: Option<PathBuf>,

        /// Output length in seconds (defaults to the voiceover length)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Music volume between 0 and 1
        #[arg(long, default_value_t = 0.1)]
        volume: f32,

        /// Loop short music to the output length instead of padding it
        #[arg(long)]
        loop_music: bool,
    },

    /// Join voice segments with pauses in between
    #[command(name = "stitch")]
    Stitch {
        /// Segments in playback order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (.wav or .mp3)
        #[arg(short, long)]
        output: PathBuf,

        /// Pause after each segment in seconds (one per input, default 0)
        #[arg(short, long, value_delimiter = ',')]
        pauses: Vec<f64>,

        /// Strip silence from each segment first
        #[arg(long)]
        strip_silence: bool,
    },

    /// Remove silent spans from a file
    #[command(name = "strip-silence")]
    StripSilence {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Silence threshold in dBFS
        #[arg(long, default_value_t = -40.0, allow_hyphen_values = true)]
        threshold_db: f32,

        /// Shortest silent span removed, in milliseconds
        #[arg(long, default_value_t = 100)]
        min_silence_ms: u64,
    },

    /// Loop or truncate music to an exact length
    #[command(name = "loop-music")]
    LoopMusic {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Target length in milliseconds
        #[arg(short, long)]
        duration_ms: u64,
    },

    /// Change speech tempo without changing pitch
    #[command(name = "tempo")]
    Tempo {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Percent change, or a preset such as 1.25X, 1.5X, 1.75X, 2X
        #[arg(short, long, allow_hyphen_values = true)]
        rate: String,
    },

    /// Apply the music volume mapping to a file
    #[command(name = "volume")]
    Volume {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Volume between 0 and 1
        #[arg(long)]
        volume: f32,
    },

    /// Download library tracks that are missing locally
    #[command(name = "fetch-music")]
    FetchMusic {
        /// Track file names
        #[arg(required = true)]
        names: Vec<String>,

        /// Fetch preview clips instead of full tracks
        #[arg(long)]
        preview: bool,
    },

    /// Print the content id of a string
    #[command(name = "id")]
    Id {
        text: String,

        /// Derive the id from a timestamped filename for this user instead
        #[arg(long)]
        user: Option<String>,
    },

    /// Delete everything in the work directory
    #[command(name = "purge-workdir")]
    PurgeWorkdir {
        /// Directory to purge (defaults to the configured work directory)
        dir: Option<PathBuf>,
    },
}
