//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;
use crate::dsp::{
    adjust_tempo, mix, stitch, synchronize, volume_to_gain_db, MixRequest, PauseSeconds, Section,
    SilenceStripper, SoundStretch, SpeechRate,
};
use crate::engine::{decode_file, encoder_for_path, write_to_file, AudioBuffer};
use crate::error::{Result, SpotmixError};
use crate::ident::{clip_id, storage_key, timestamped_filename, ContentId};
use crate::scratch::purge_workdir;

fn load(path: &Path) -> Result<AudioBuffer> {
    let buffer = decode_file(path)?;
    info!(
        "Loaded {}: {} ms, {} Hz, {} channels",
        path.display(),
        buffer.duration_ms(),
        buffer.sample_rate(),
        buffer.channels()
    );
    Ok(buffer)
}

fn save(config: &Config, buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let encoder = encoder_for_path(path, &config.ffmpeg_path)?;
    write_to_file(encoder.as_ref(), buffer, path)?;
    println!("Wrote {} ({} ms)", path.display(), buffer.duration_ms());
    Ok(())
}

/// An existing file is used as is; anything else names a library track.
fn music_path(config: &Config, music: &Path) -> Result<PathBuf> {
    if music.is_file() {
        return Ok(music.to_path_buf());
    }
    let name = music.to_string_lossy();
    config.music_library()?.resolve(&name)
}

/// Mix a voiceover with optional music.
pub fn mix_files(
    config: &Config,
    voice: &Path,
    music: Option<&Path>,
    output: &Path,
    duration: Option<f64>,
    volume: f32,
    loop_music: bool,
) -> Result<()> {
    info!("Mixing {} into {}", voice.display(), output.display());

    let voice = load(voice)?;
    let target_secs = duration.unwrap_or(voice.duration_ms() as f64 / 1000.0);

    let music = match music {
        Some(path) => {
            let music = load(&music_path(config, path)?)?;
            if loop_music {
                let target_ms = (target_secs.max(0.0) * 1000.0).round() as u64;
                Some(synchronize(&music, target_ms)?)
            } else {
                Some(music)
            }
        }
        None => None,
    };

    let mixed = mix(&MixRequest::new(voice, music, target_secs, volume))?;
    save(config, &mixed, output)
}

/// Stitch segments with pauses.
pub fn stitch_files(
    config: &Config,
    inputs: &[PathBuf],
    pauses: &[f64],
    output: &Path,
    strip_silence: bool,
) -> Result<()> {
    info!("Stitching {} segments into {}", inputs.len(), output.display());

    if pauses.len() > inputs.len() {
        return Err(SpotmixError::InvalidField {
            field: "pauses",
            reason: format!("{} pauses given for {} inputs", pauses.len(), inputs.len()),
        });
    }

    let stripper = SilenceStripper::default();
    let mut sections = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let mut voice = load(input)?;
        if strip_silence {
            voice = stripper.strip(&voice);
        }
        let pause = PauseSeconds(pauses.get(i).copied().unwrap_or(0.0));
        sections.push(Section::new(voice, pause.as_ms()));
    }

    save(config, &stitch(&sections)?, output)
}

/// Remove silent spans.
pub fn strip_silence(
    config: &Config,
    input: &Path,
    output: &Path,
    threshold_db: f32,
    min_silence_ms: u64,
) -> Result<()> {
    info!("Stripping silence below {} dBFS from {}", threshold_db, input.display());

    let buffer = load(input)?;
    let stripped = SilenceStripper::new(threshold_db, min_silence_ms).strip(&buffer);
    if stripped.is_empty() {
        warn!("{} is silent throughout; output is empty", input.display());
    }

    println!(
        "Removed {} ms of silence",
        buffer.duration_ms().saturating_sub(stripped.duration_ms())
    );
    save(config, &stripped, output)
}

/// Loop or truncate music to a length.
pub fn loop_music(config: &Config, input: &Path, output: &Path, duration_ms: u64) -> Result<()> {
    info!("Fitting {} to {} ms", input.display(), duration_ms);

    let music = load(input)?;
    save(config, &synchronize(&music, duration_ms)?, output)
}

/// Change tempo by a percent or preset.
pub fn tempo(config: &Config, input: &Path, output: &Path, rate: &str) -> Result<()> {
    let rate = match rate.trim().parse::<f64>() {
        Ok(percent) => SpeechRate::Percent(percent),
        Err(_) => SpeechRate::Preset(rate.to_string()),
    };
    let change = rate.resolve();
    if change.is_none() {
        warn!("Rate {:?} means no change; copying input", rate);
    }

    let buffer = load(input)?;
    let stretcher = SoundStretch::new(&config.soundstretch_path);
    let adjusted = adjust_tempo(&buffer, change, &stretcher)?;
    save(config, &adjusted, output)
}

/// Apply the volume mapping.
pub fn volume(config: &Config, input: &Path, output: &Path, volume: f32) -> Result<()> {
    let gain_db = volume_to_gain_db(volume)?;
    info!("Applying {:.1} dB to {}", gain_db, input.display());

    let buffer = load(input)?;
    save(config, &buffer.gain(gain_db), output)
}

/// Make library tracks available locally.
pub fn fetch_music(config: &Config, names: &[String], preview: bool) -> Result<()> {
    let library = if preview {
        config.preview_library()?
    } else {
        config.music_library()?
    };
    if !library.has_fetcher() {
        warn!("No catalog configured; only checking {}", library.dir().display());
    }

    for name in names {
        let path = library.resolve(name)?;
        println!("{}", path.display());
    }
    Ok(())
}

/// Print a content id.
pub fn content_id(config: &Config, text: &str, user: Option<&str>) -> Result<()> {
    let input = match user {
        Some(user) => timestamped_filename(text, user, ".mp3"),
        None => text.to_string(),
    };
    let id = clip_id(&config.id_prefix, &ContentId::from_input(&input));

    println!("Input: {}", input);
    println!("Id: {}", id);
    println!("Key: {}", storage_key(&config.storage_namespace, &id));

    Ok(())
}

/// Purge the work directory.
pub fn purge(config: &Config, dir: Option<&Path>) -> Result<()> {
    let dir = dir.unwrap_or(config.workdir.as_path());
    info!("Purging work directory: {}", dir.display());

    let report = purge_workdir(dir);
    println!(
        "Removed {} files and {} directories ({} failures)",
        report.files_removed, report.dirs_removed, report.failures
    );

    Ok(())
}
