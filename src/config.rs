//! Runtime configuration
//!
//! Passed explicitly into every recipe. Built from defaults, a JSON file, or
//! `SPOTMIX_*` environment variables layered over the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpotmixError};
use crate::services::MusicLibrary;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Parent of every per-request scratch directory
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Local copy of the background music library
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,

    /// Local copy of the music preview clips
    #[serde(default = "default_preview_dir")]
    pub preview_dir: PathBuf,

    /// Key prefix under which produced clips are stored
    #[serde(default = "default_storage_namespace")]
    pub storage_namespace: String,

    /// Prefix marking clips produced by this service
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Length of the mood lead-in cut from emotive speech
    #[serde(default = "default_mood_interval_ms")]
    pub mood_interval_ms: u64,

    #[serde(default = "default_soundstretch_path")]
    pub soundstretch_path: PathBuf,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Base URL missing music tracks are downloaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_base_url: Option<String>,

    /// Base URL missing preview clips are downloaded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_base_url: Option<String>,
}

fn default_workdir() -> PathBuf {
    PathBuf::from("data/workdir")
}

fn default_music_dir() -> PathBuf {
    PathBuf::from("data/background_music")
}

fn default_preview_dir() -> PathBuf {
    PathBuf::from("data/background_music_previews")
}

fn default_storage_namespace() -> String {
    "primary--distribution".to_string()
}

fn default_id_prefix() -> String {
    "pyro_".to_string()
}

fn default_mood_interval_ms() -> u64 {
    2000
}

fn default_soundstretch_path() -> PathBuf {
    PathBuf::from("soundstretch")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            music_dir: default_music_dir(),
            preview_dir: default_preview_dir(),
            storage_namespace: default_storage_namespace(),
            id_prefix: default_id_prefix(),
            mood_interval_ms: default_mood_interval_ms(),
            soundstretch_path: default_soundstretch_path(),
            ffmpeg_path: default_ffmpeg_path(),
            music_base_url: None,
            preview_base_url: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SpotmixError::FileNotFound {
            path: path.to_path_buf(),
            source: Some(e),
        })?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Defaults overlaid with `SPOTMIX_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Full-length music tracks, fetched from `music_base_url` when missing
    pub fn music_library(&self) -> Result<MusicLibrary> {
        MusicLibrary::from_config(&self.music_dir, self.music_base_url.as_deref())
    }

    /// Preview clips, fetched from `preview_base_url` when missing
    pub fn preview_library(&self) -> Result<MusicLibrary> {
        MusicLibrary::from_config(&self.preview_dir, self.preview_base_url.as_deref())
    }

    /// Overlay values found by `lookup` (called with `SPOTMIX_*` names)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SPOTMIX_WORKDIR") {
            self.workdir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SPOTMIX_MUSIC_DIR") {
            self.music_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SPOTMIX_PREVIEW_DIR") {
            self.preview_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SPOTMIX_STORAGE_NAMESPACE") {
            self.storage_namespace = v;
        }
        if let Some(v) = lookup("SPOTMIX_ID_PREFIX") {
            self.id_prefix = v;
        }
        if let Some(v) = lookup("SPOTMIX_MOOD_INTERVAL_MS") {
            self.mood_interval_ms = v.trim().parse().map_err(|_| SpotmixError::InvalidField {
                field: "SPOTMIX_MOOD_INTERVAL_MS",
                reason: format!("'{}' is not a whole number of milliseconds", v),
            })?;
        }
        if let Some(v) = lookup("SPOTMIX_SOUNDSTRETCH") {
            self.soundstretch_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SPOTMIX_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SPOTMIX_MUSIC_BASE_URL") {
            self.music_base_url = Some(v);
        }
        if let Some(v) = lookup("SPOTMIX_PREVIEW_BASE_URL") {
            self.preview_base_url = Some(v);
        }
        Ok(())
    }
}
