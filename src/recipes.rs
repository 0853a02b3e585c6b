//! Request recipes
//!
//! Each recipe validates its whole request before touching audio, works in
//! a private [`Scratch`] directory that is removed on every exit path, and
//! returns a typed outcome. Request types deserialize from the JSON bodies
//! clients send.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::dsp::{
    adjust_tempo, mix, stitch, synchronize, validate_volume, volume_to_gain_db, MixRequest,
    PauseSeconds, Section, SilenceStripper, SpeechRate, TimeStretcher,
};
use crate::engine::buffer::AudioBuffer;
use crate::engine::decode::decode_bytes;
use crate::engine::encode::{write_to_file, Encoder};
use crate::error::{MixStage, Result, SpotmixError};
use crate::ident::{clip_id, storage_key, timestamped_filename, ContentId};
use crate::scratch::Scratch;
use crate::services::{MusicLibrary, ObjectStore, SpeechSource, SynthesisRequest, VoiceResolver};

// ============================================================================
// Requests
// ============================================================================

const NO_MUSIC: &str = "no music";

fn default_music_vol() -> f32 {
    0.1
}

fn default_model_id() -> String {
    crate::services::speech::DEFAULT_MODEL_ID.to_string()
}

fn default_intonation_consistency() -> f32 {
    50.0
}

/// Sections plus optional music, mixed and uploaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceSpotRequest {
    pub user_id: String,
    pub history_item_id_list: Vec<String>,
    /// Pause after each section, in seconds
    pub end_of_section_pause_duration_list: Vec<PauseSeconds>,
    /// Blank or "No Music" uploads the stitched voice alone
    #[serde(default)]
    pub music_filename: Option<String>,
    #[serde(default = "default_music_vol")]
    pub music_vol: f32,
}

/// One voice clip mixed with a library track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateMixRequest {
    pub music_choice: String,
    pub user_id: String,
    /// Output length in seconds
    pub ad_length: f64,
    #[serde(default = "default_music_vol")]
    pub music_vol: f32,
    #[serde(default)]
    pub history_item_id: Option<String>,
    #[serde(default)]
    pub pyro_history_item_id: Option<String>,
}

/// Sections stitched and uploaded without music
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchSectionsRequest {
    pub user_id: String,
    pub history_item_id_list: Vec<String>,
    pub end_of_section_pause_duration_list: Vec<PauseSeconds>,
}

/// Script synthesized, optionally with an emotion and speech rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessVoiceoverRequest {
    pub script: String,
    pub voice: String,
    #[serde(default)]
    pub voice_gender: Option<String>,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    pub user_id: String,
    #[serde(default)]
    pub speech_rate: Option<SpeechRate>,
    /// Percent, 0 to 100
    #[serde(default = "default_intonation_consistency")]
    pub voice_intonation_consistency: f32,
    #[serde(default)]
    pub emotion: Option<String>,
}

/// A preview clip at a given music volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewVolumeRequest {
    pub music_choice: String,
    pub user_id: String,
    #[serde(default = "default_music_vol")]
    pub music_vol: f32,
}

// ============================================================================
// Outcomes
// ============================================================================

/// A clip uploaded to object storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredClip {
    #[serde(rename = "pyro_history_item_id")]
    pub id: String,
    #[serde(skip)]
    pub key: String,
}

/// Encoded audio returned to the caller as a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedClip {
    pub bytes: Vec<u8>,
    pub download_name: String,
    pub content_type: &'static str,
}

// ============================================================================
// Script helpers
// ============================================================================

/// Prefix a script with a spoken mood cue
///
/// The cue is cut from the synthesized audio afterwards; it only colours the
/// delivery of the script.
pub fn moodify_script(script: &str, voice_gender: Option<&str>, emotion: &str) -> String {
    let pronoun = match voice_gender {
        Some(gender) if gender.trim().eq_ignore_ascii_case("male") => "He",
        _ => "She",
    };
    format!(
        "{} said {} <break time=\"0.8s\" /> \"{}\"",
        pronoun, emotion, script
    )
}

// ============================================================================
// Pipeline
// ============================================================================

/// Everything the recipes need, passed in explicitly
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub speech: &'a dyn SpeechSource,
    pub store: &'a dyn ObjectStore,
    pub music: &'a MusicLibrary,
    pub previews: &'a MusicLibrary,
    pub stretcher: &'a dyn TimeStretcher,
    pub encoder: &'a dyn Encoder,
}

impl<'a> Pipeline<'a> {
    fn voices(&self) -> VoiceResolver<'a> {
        VoiceResolver::new(
            self.speech,
            self.store,
            &self.config.storage_namespace,
            &self.config.id_prefix,
        )
    }

    /// Stitch sections, lay music under them and upload the result
    pub fn produce_spot(&self, request: &ProduceSpotRequest) -> Result<StoredClip> {
        require("user_id", &request.user_id)?;
        validate_sections(
            &request.history_item_id_list,
            &request.end_of_section_pause_duration_list,
        )?;
        validate_volume(request.music_vol)?;

        let scratch = Scratch::new(&self.config.workdir)?;
        let voice = self
            .build_sections(
                &request.history_item_id_list,
                &request.end_of_section_pause_duration_list,
            )
            .map_err(|e| SpotmixError::mix_failed(MixStage::LoadVoice, e))?;
        info!("Stitched voiceover: {} ms", voice.duration_ms());

        let music_filename = request
            .music_filename
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && !name.eq_ignore_ascii_case(NO_MUSIC));

        let spot = match music_filename {
            None => {
                info!("No music selected; uploading voiceover only");
                voice
            }
            Some(filename) if voice.is_empty() => {
                warn!(
                    "Voiceover is silent throughout; uploading it without music {}",
                    filename
                );
                voice
            }
            Some(filename) => {
                let music = self
                    .music
                    .load(filename)
                    .map_err(|e| SpotmixError::mix_failed(MixStage::LoadMusic, e))?;
                let music = synchronize(&music, voice.duration_ms())
                    .map_err(|e| SpotmixError::mix_failed(MixStage::LoadMusic, e))?;
                info!("Music {} adjusted to {} ms", filename, music.duration_ms());

                let target_secs = voice.duration_ms() as f64 / 1000.0;
                mix(&MixRequest::new(
                    voice,
                    Some(music),
                    target_secs,
                    request.music_vol,
                ))?
            }
        };

        let bytes = self
            .export(&scratch, &spot, "combined_", &request.user_id)
            .map_err(|e| SpotmixError::mix_failed(MixStage::Export, e))?;
        self.upload("produced_spot_", &request.user_id, &bytes)
    }

    /// Mix one voice clip with a library track and return the encoded mix
    pub fn generate_mix(&self, request: &GenerateMixRequest) -> Result<EncodedClip> {
        require("user_id", &request.user_id)?;
        require("music_choice", &request.music_choice)?;
        validate_volume(request.music_vol)?;
        let voice_id = request
            .history_item_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| {
                request
                    .pyro_history_item_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
            })
            .ok_or(SpotmixError::MissingField {
                field: "history_item_id",
            })?;

        let scratch = Scratch::new(&self.config.workdir)?;
        let voice = self
            .voices()
            .resolve(voice_id)
            .map_err(|e| SpotmixError::mix_failed(MixStage::LoadVoice, e))?;
        info!("Loaded voiceover {} ({} ms)", voice_id, voice.duration_ms());

        let music = self
            .music
            .load(&request.music_choice)
            .map_err(|e| SpotmixError::mix_failed(MixStage::LoadMusic, e))?;

        let mixed = mix(&MixRequest::new(
            voice,
            Some(music),
            request.ad_length,
            request.music_vol,
        ))?;
        let bytes = self
            .export(&scratch, &mixed, "combined", &request.user_id)
            .map_err(|e| SpotmixError::mix_failed(MixStage::Export, e))?;

        Ok(EncodedClip {
            bytes,
            download_name: format!("combined_{}.{}", request.user_id, self.encoder.extension()),
            content_type: self.encoder.content_type(),
        })
    }

    /// Stitch sections without music and upload them
    pub fn stitch_sections(&self, request: &StitchSectionsRequest) -> Result<StoredClip> {
        require("user_id", &request.user_id)?;
        validate_sections(
            &request.history_item_id_list,
            &request.end_of_section_pause_duration_list,
        )?;

        let scratch = Scratch::new(&self.config.workdir)?;
        let voice = self.build_sections(
            &request.history_item_id_list,
            &request.end_of_section_pause_duration_list,
        )?;
        info!("Stitched voiceover: {} ms", voice.duration_ms());

        let bytes = self.export(&scratch, &voice, "sectioned_voiceover_", &request.user_id)?;
        self.upload("stitched_voiceover_", &request.user_id, &bytes)
    }

    /// Synthesize a script, shape it and upload it
    pub fn preprocess_voiceover(&self, request: &PreprocessVoiceoverRequest) -> Result<StoredClip> {
        require("user_id", &request.user_id)?;
        let consistency = request.voice_intonation_consistency;
        if !(0.0..=100.0).contains(&consistency) {
            return Err(SpotmixError::InvalidField {
                field: "voice_intonation_consistency",
                reason: format!("{} is outside 0 to 100", consistency),
            });
        }
        let emotion = request
            .emotion
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let tempo = request.speech_rate.as_ref().and_then(SpeechRate::resolve);

        let text = match emotion {
            Some(emotion) => {
                moodify_script(&request.script, request.voice_gender.as_deref(), emotion)
            }
            None => request.script.clone(),
        };
        let mut synthesis = SynthesisRequest::new(text, request.voice.clone());
        synthesis.model_id = request.model_id.clone();
        synthesis.stability = consistency / 100.0;
        synthesis.validate()?;

        let scratch = Scratch::new(&self.config.workdir)?;
        let bytes = self.speech.synthesize(&synthesis)?;
        let mut voice = decode_bytes(bytes, Some("mp3"))?;
        info!("Synthesized {} ms of speech", voice.duration_ms());

        if emotion.is_some() {
            voice = voice.slice_from(self.config.mood_interval_ms);
            voice = SilenceStripper::default().strip(&voice);
            info!("Mood cue removed; {} ms remain", voice.duration_ms());
        }

        let voice = adjust_tempo(&voice, tempo, self.stretcher)?;

        let bytes = self.export(&scratch, &voice, "processed_voiceover_", &request.user_id)?;
        self.upload("processed_voiceover_", &request.user_id, &bytes)
    }

    /// Return a preview track at the requested music volume
    pub fn preview_volume(&self, request: &PreviewVolumeRequest) -> Result<EncodedClip> {
        require("user_id", &request.user_id)?;
        require("music_choice", &request.music_choice)?;
        let gain_db = volume_to_gain_db(request.music_vol)?;

        let scratch = Scratch::new(&self.config.workdir)?;
        let preview = self.previews.load(&request.music_choice)?;
        let adjusted = preview.gain(gain_db);
        info!("Preview {} at {:.1} dB", request.music_choice, gain_db);

        let bytes = self.export(&scratch, &adjusted, "vol_changed", &request.user_id)?;
        Ok(EncodedClip {
            bytes,
            download_name: format!(
                "vol_changed_{}.{}",
                request.user_id,
                self.encoder.extension()
            ),
            content_type: self.encoder.content_type(),
        })
    }

    // ------------------------------------------------------------------------
    // Shared stages
    // ------------------------------------------------------------------------

    /// Resolve, strip and stitch every section in order
    fn build_sections(&self, ids: &[String], pauses: &[PauseSeconds]) -> Result<AudioBuffer> {
        let voices = self.voices();
        let stripper = SilenceStripper::default();

        let sections = ids
            .iter()
            .zip(pauses)
            .map(|(id, pause)| {
                let voice = voices.resolve(id)?;
                Ok(Section::new(stripper.strip(&voice), pause.as_ms()))
            })
            .collect::<Result<Vec<_>>>()?;

        stitch(&sections)
    }

    /// Encode into a scratch file and read the finished file back
    fn export(
        &self,
        scratch: &Scratch,
        buffer: &AudioBuffer,
        base: &str,
        user_id: &str,
    ) -> Result<Vec<u8>> {
        let extension = format!(".{}", self.encoder.extension());
        let path = scratch.path_for(&timestamped_filename(base, user_id, &extension));
        write_to_file(self.encoder, buffer, &path)?;
        Ok(std::fs::read(&path)?)
    }

    /// Upload under a fresh content-addressed id
    fn upload(&self, base: &str, user_id: &str, bytes: &[u8]) -> Result<StoredClip> {
        let extension = format!(".{}", self.encoder.extension());
        let content_id = ContentId::from_input(&timestamped_filename(base, user_id, &extension));
        let id = clip_id(&self.config.id_prefix, &content_id);
        let key = storage_key(&self.config.storage_namespace, &id);

        self.store.put(&key, bytes, self.encoder.content_type())?;
        info!("Uploaded {} ({} bytes)", key, bytes.len());

        Ok(StoredClip { id, key })
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SpotmixError::MissingField { field });
    }
    Ok(())
}

fn validate_sections(ids: &[String], pauses: &[PauseSeconds]) -> Result<()> {
    if ids.is_empty() {
        return Err(SpotmixError::MissingField {
            field: "history_item_id_list",
        });
    }
    if ids.len() != pauses.len() {
        return Err(SpotmixError::InvalidField {
            field: "end_of_section_pause_duration_list",
            reason: format!(
                "{} pauses given for {} sections",
                pauses.len(),
                ids.len()
            ),
        });
    }
    if let Some(blank) = ids.iter().position(|id| id.trim().is_empty()) {
        return Err(SpotmixError::InvalidField {
            field: "history_item_id_list",
            reason: format!("entry {} is blank", blank),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moodify_script() {
        assert_eq!(
            moodify_script("Buy now!", Some("male"), "enthusiastically"),
            "He said enthusiastically <break time=\"0.8s\" /> \"Buy now!\""
        );
        assert_eq!(
            moodify_script("Buy now!", Some("female"), "calmly"),
            "She said calmly <break time=\"0.8s\" /> \"Buy now!\""
        );
        assert!(moodify_script("Hi", None, "softly").starts_with("She said softly"));
    }

    #[test]
    fn test_section_validation() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(validate_sections(&ids, &[PauseSeconds(0.5), PauseSeconds(1.0)]).is_ok());
        assert!(validate_sections(&ids, &[PauseSeconds(0.5)])
            .unwrap_err()
            .is_validation());
        assert!(validate_sections(&[], &[]).unwrap_err().is_validation());
        assert!(validate_sections(&["".to_string()], &[PauseSeconds(0.0)])
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_request_defaults() {
        let request: ProduceSpotRequest = serde_json::from_str(
            r#"{
                "user_id": "u1",
                "history_item_id_list": ["h1", "pyro_abc1234"],
                "end_of_section_pause_duration_list": [0.5, 1]
            }"#,
        )
        .unwrap();
        assert_eq!(request.music_vol, 0.1);
        assert_eq!(request.music_filename, None);
        assert_eq!(request.end_of_section_pause_duration_list[1].as_ms(), 1000);

        let request: PreprocessVoiceoverRequest = serde_json::from_str(
            r#"{"script": "Hi", "voice": "v1", "user_id": "u1", "speech_rate": "1.25X"}"#,
        )
        .unwrap();
        assert_eq!(request.model_id, "eleven_multilingual_v2");
        assert_eq!(request.voice_intonation_consistency, 50.0);
        assert_eq!(
            request.speech_rate.and_then(|r| r.resolve()).map(|c| c.percent()),
            Some(25.0)
        );
    }

    #[test]
    fn test_stored_clip_serializes_public_id_only() {
        let clip = StoredClip {
            id: "pyro_abc1234".to_string(),
            key: "primary--distribution/pyro_abc1234".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&clip).unwrap(),
            r#"{"pyro_history_item_id":"pyro_abc1234"}"#
        );
    }
}
