//! Speech synthesis source

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpotmixError};

/// Synthesis model used when a request names none
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// MP3 at 44.1 kHz, 192 kbps
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_192";

pub const DEFAULT_STABILITY: f32 = 0.5;

pub const DEFAULT_SIMILARITY_BOOST: f32 = 0.75;

/// Text-to-speech request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
    pub output_format: String,
    /// Intonation consistency in `[0, 1]`
    pub stability: f32,
    pub similarity_boost: f32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            stability: DEFAULT_STABILITY,
            similarity_boost: DEFAULT_SIMILARITY_BOOST,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(SpotmixError::MissingField { field: "script" });
        }
        if self.voice_id.trim().is_empty() {
            return Err(SpotmixError::MissingField { field: "voice" });
        }
        if !(0.0..=1.0).contains(&self.stability) {
            return Err(SpotmixError::InvalidField {
                field: "voice_intonation_consistency",
                reason: format!("{} is outside [0, 1]", self.stability),
            });
        }
        Ok(())
    }
}

/// Third-party speech provider
///
/// Both calls return encoded audio (MP3 unless the request says otherwise).
pub trait SpeechSource {
    /// Audio of a previously generated history item
    fn audio_for_history_item(&self, history_item_id: &str) -> Result<Vec<u8>>;

    /// Generate speech for `request`
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = SynthesisRequest::new("Hello", "voice-1");
        assert_eq!(request.model_id, "eleven_multilingual_v2");
        assert_eq!(request.output_format, "mp3_44100_192");
        assert_eq!(request.stability, 0.5);
        assert_eq!(request.similarity_boost, 0.75);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(SynthesisRequest::new("  ", "voice-1").validate().is_err());
        assert!(SynthesisRequest::new("Hi", "").validate().is_err());

        let mut request = SynthesisRequest::new("Hi", "voice-1");
        request.stability = 50.0;
        assert!(request.validate().unwrap_err().is_validation());
    }
}
