//! Resolving history ids to voice audio

use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::engine::decode::decode_bytes;
use crate::error::{Result, SpotmixError};
use crate::ident::storage_key;
use crate::services::speech::SpeechSource;
use crate::services::storage::ObjectStore;

/// Loads voice audio by history id
///
/// Ids carrying the service prefix name clips this service uploaded and are
/// read from object storage; anything else is a speech provider history id.
pub struct VoiceResolver<'a> {
    speech: &'a dyn SpeechSource,
    store: &'a dyn ObjectStore,
    namespace: &'a str,
    id_prefix: &'a str,
}

impl<'a> VoiceResolver<'a> {
    pub fn new(
        speech: &'a dyn SpeechSource,
        store: &'a dyn ObjectStore,
        namespace: &'a str,
        id_prefix: &'a str,
    ) -> Self {
        Self {
            speech,
            store,
            namespace,
            id_prefix,
        }
    }

    /// Whether `history_item_id` names a clip this service produced
    pub fn is_own_clip(&self, history_item_id: &str) -> bool {
        history_item_id.starts_with(self.id_prefix)
    }

    /// Fetch and decode the audio for a history id
    pub fn resolve(&self, history_item_id: &str) -> Result<AudioBuffer> {
        if history_item_id.trim().is_empty() {
            return Err(SpotmixError::MissingField {
                field: "history_item_id",
            });
        }

        let bytes = if self.is_own_clip(history_item_id) {
            let key = storage_key(self.namespace, history_item_id);
            debug!("Loading stored clip {}", key);
            self.store.get(&key)?
        } else {
            debug!("Loading speech history item {}", history_item_id);
            self.speech.audio_for_history_item(history_item_id)?
        };

        decode_bytes(bytes, Some("mp3"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::{generate_test_tone, wav_to_bytes, ExportFormat};
    use crate::services::speech::SynthesisRequest;
    use crate::services::storage::MemoryObjectStore;

    struct ToneSpeech;

    impl SpeechSource for ToneSpeech {
        fn audio_for_history_item(&self, history_item_id: &str) -> Result<Vec<u8>> {
            if history_item_id == "unknown" {
                return Err(SpotmixError::SpeechSynthesis {
                    reason: "history item not found".to_string(),
                });
            }
            wav_to_bytes(
                &generate_test_tone(300.0, 0.5, 700, 44100),
                ExportFormat::default(),
            )
        }

        fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
            unreachable!("not used by the resolver")
        }
    }

    #[test]
    fn test_provider_history_item() {
        let store = MemoryObjectStore::new();
        let resolver = VoiceResolver::new(&ToneSpeech, &store, "primary--distribution", "pyro_");

        let voice = resolver.resolve("21m00Tcm4TlvDq8ikWAM").unwrap();
        assert_eq!(voice.duration_ms(), 700);
    }

    #[test]
    fn test_own_clip_comes_from_storage() {
        let store = MemoryObjectStore::new();
        let clip = generate_test_tone(300.0, 0.5, 1250, 44100);
        store
            .put(
                "primary--distribution/pyro_1a2b3c4",
                &wav_to_bytes(&clip, ExportFormat::default()).unwrap(),
                "audio/wav",
            )
            .unwrap();
        let resolver = VoiceResolver::new(&ToneSpeech, &store, "primary--distribution", "pyro_");

        let voice = resolver.resolve("pyro_1a2b3c4").unwrap();
        assert_eq!(voice.duration_ms(), 1250);
    }

    #[test]
    fn test_missing_stored_clip() {
        let store = MemoryObjectStore::new();
        let resolver = VoiceResolver::new(&ToneSpeech, &store, "primary--distribution", "pyro_");
        let err = resolver.resolve("pyro_0000000").unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_provider_failure_and_blank_id() {
        let store = MemoryObjectStore::new();
        let resolver = VoiceResolver::new(&ToneSpeech, &store, "primary--distribution", "pyro_");
        assert!(resolver.resolve("unknown").is_err());
        assert!(resolver.resolve("").unwrap_err().is_validation());
    }
}
