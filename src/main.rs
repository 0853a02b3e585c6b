//! Spotmix CLI - Promo Spot Audio Assembly
//!
//! Command-line interface to the spotmix assembly stages.

use anyhow::Context;
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use spotmix::cli::commands;
use spotmix::cli::{Cli, Commands};
use spotmix::Config;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // SPOTMIX_LOG wins over RUST_LOG; --verbose raises the default to debug
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("SPOTMIX_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Spotmix v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Invalid SPOTMIX_* environment")?,
    };

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("Spotmix v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &Config, cmd: Commands) -> anyhow::Result<()> {
    let result = match cmd {
        Commands::Mix {
            voice,
            output,
            music,
            duration,
            volume,
            loop_music,
        } => commands::mix_files(
            config,
            &voice,
            music.as_deref(),
            &output,
            duration,
            volume,
            loop_music,
        ),
        Commands::Stitch {
            inputs,
            output,
            pauses,
            strip_silence,
        } => commands::stitch_files(config, &inputs, &pauses, &output, strip_silence),
        Commands::StripSilence {
            input,
            output,
            threshold_db,
            min_silence_ms,
        } => commands::strip_silence(config, &input, &output, threshold_db, min_silence_ms),
        Commands::LoopMusic {
            input,
            output,
            duration_ms,
        } => commands::loop_music(config, &input, &output, duration_ms),
        Commands::Tempo {
            input,
            output,
            rate,
        } => commands::tempo(config, &input, &output, &rate),
        Commands::Volume {
            input,
            output,
            volume,
        } => commands::volume(config, &input, &output, volume),
        Commands::FetchMusic { names, preview } => {
            commands::fetch_music(config, &names, preview)
        }
        Commands::Id { text, user } => commands::content_id(config, &text, user.as_deref()),
        Commands::PurgeWorkdir { dir } => commands::purge(config, dir.as_deref()),
    };

    if let Err(e) = &result {
        for suggestion in e.recovery_suggestions() {
            eprintln!("hint: {}", suggestion);
        }
    }
    result.context("Command failed")
}
