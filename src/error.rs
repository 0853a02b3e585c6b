//! Error handling for spotmix
//!
//! Every failure carries enough context to be reported at the request
//! boundary. Primitives never swallow errors; recipes decide what to report.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for spotmix operations
pub type Result<T> = std::result::Result<T, SpotmixError>;

/// Broad failure classes, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad request input, rejected before any transform ran
    Validation,
    /// Unreadable audio, failed storage call, missing file
    Io,
    /// An external process failed or could not be started
    ExternalTool,
    /// A temporary file could not be removed
    Cleanup,
}

/// Stage of the mix at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixStage {
    LoadVoice,
    LoadMusic,
    Export,
}

impl fmt::Display for MixStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MixStage::LoadVoice => "load voice",
            MixStage::LoadMusic => "load music",
            MixStage::Export => "export",
        };
        f.write_str(name)
    }
}

/// Main error type for spotmix operations
#[derive(Error, Debug)]
pub enum SpotmixError {
    // Validation Errors
    #[error("Music volume {volume} is outside [0, 1]")]
    InvalidVolume { volume: f32 },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid audio: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Music track not available: {filename}")]
    MusicNotFound { filename: String },

    // Collaborator Errors
    #[error("Object storage failure for '{key}': {reason}")]
    Storage { key: String, reason: String },

    #[error("Speech synthesis failed: {reason}")]
    SpeechSynthesis { reason: String },

    #[error("Music download failed for '{filename}': {reason}")]
    MusicFetch { filename: String, reason: String },

    // External Tool Errors
    #[error("Failed to start {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    // Pipeline Errors
    #[error("Mix failed during {stage}: {source}")]
    MixFailed {
        stage: MixStage,
        #[source]
        source: Box<SpotmixError>,
    },

    #[error("Failed to remove {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SpotmixError {
    /// Wrap an error as a failure of the given mix stage.
    pub fn mix_failed(stage: MixStage, source: SpotmixError) -> Self {
        SpotmixError::MixFailed {
            stage,
            source: Box::new(source),
        }
    }

    pub(crate) fn invalid_audio<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SpotmixError::InvalidAudio {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            SpotmixError::InvalidVolume { .. } => "INVALID_VOLUME",
            SpotmixError::MissingField { .. } => "MISSING_FIELD",
            SpotmixError::InvalidField { .. } => "INVALID_FIELD",
            SpotmixError::FileNotFound { .. } => "FILE_NOT_FOUND",
            SpotmixError::InvalidAudio { .. } => "INVALID_AUDIO",
            SpotmixError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            SpotmixError::MusicNotFound { .. } => "MUSIC_NOT_FOUND",
            SpotmixError::Storage { .. } => "STORAGE_ERROR",
            SpotmixError::SpeechSynthesis { .. } => "SPEECH_SYNTHESIS_ERROR",
            SpotmixError::MusicFetch { .. } => "MUSIC_FETCH_ERROR",
            SpotmixError::ToolUnavailable { .. } => "TOOL_UNAVAILABLE",
            SpotmixError::ToolFailed { .. } => "TOOL_FAILED",
            SpotmixError::MixFailed { .. } => "MIX_FAILED",
            SpotmixError::Cleanup { .. } => "CLEANUP_FAILED",
            SpotmixError::Io(_) => "IO_ERROR",
            SpotmixError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Classify the error for the request boundary.
    ///
    /// A tagged mix failure takes the category of its cause.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SpotmixError::InvalidVolume { .. }
            | SpotmixError::MissingField { .. }
            | SpotmixError::InvalidField { .. } => ErrorCategory::Validation,
            SpotmixError::ToolUnavailable { .. } | SpotmixError::ToolFailed { .. } => {
                ErrorCategory::ExternalTool
            }
            SpotmixError::Cleanup { .. } => ErrorCategory::Cleanup,
            SpotmixError::MixFailed { source, .. } => source.category(),
            _ => ErrorCategory::Io,
        }
    }

    /// Check whether the request was rejected before any transform ran
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SpotmixError::InvalidVolume { .. } => vec!["Pass a music volume between 0.0 and 1.0"],
            SpotmixError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been cleaned up from the work directory",
            ],
            SpotmixError::InvalidAudio { .. } | SpotmixError::UnsupportedFormat { .. } => vec![
                "Convert the file to WAV or MP3 first",
                "Only mono and stereo audio is supported",
            ],
            SpotmixError::MusicNotFound { .. } => vec![
                "Check the music filename against the catalog",
                "Set SPOTMIX_MUSIC_BASE_URL or SPOTMIX_PREVIEW_BASE_URL and build with the catalog-http feature to download missing tracks",
            ],
            SpotmixError::ToolUnavailable { .. } => vec![
                "Install soundstretch (SoundTouch) and ffmpeg",
                "Point SPOTMIX_SOUNDSTRETCH / SPOTMIX_FFMPEG at the binaries",
            ],
            SpotmixError::MixFailed { source, .. } => source.recovery_suggestions(),
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SpotmixError::InvalidVolume { volume: 1.5 };
        assert_eq!(err.error_code(), "INVALID_VOLUME");
        assert!(err.is_validation());
    }

    #[test]
    fn test_mix_failure_takes_cause_category() {
        let err = SpotmixError::mix_failed(
            MixStage::Export,
            SpotmixError::ToolFailed {
                tool: "ffmpeg".to_string(),
                exit_code: 1,
                stderr: "boom".to_string(),
            },
        );
        assert_eq!(err.error_code(), "MIX_FAILED");
        assert_eq!(err.category(), ErrorCategory::ExternalTool);
        assert!(err.to_string().contains("export"));
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = SpotmixError::MusicNotFound {
            filename: "upbeat.mp3".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
