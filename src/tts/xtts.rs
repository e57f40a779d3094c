use async_trait::async_trait;
use serde::Serialize;

use super::{SpeechSynthesizer, SynthesizedAudio, status_error, transport_error};
use crate::foundation::error::LipsyncResult;

pub const DEFAULT_SPEAKER_WAV: &str = "reference.wav";
pub const DEFAULT_LANGUAGE: &str = "fr";

#[derive(Serialize)]
struct TtsToAudioRequest<'a> {
    text: &'a str,
    speaker_wav: &'a str,
    language: &'a str,
}

/// Self-hosted XTTS v2 server (`xtts-api-server` compatible). Returns WAV audio.
#[derive(Clone, Debug)]
pub struct XttsSynthesizer {
    client: reqwest::Client,
    server_url: String,
    speaker_wav: String,
    language: String,
}

impl XttsSynthesizer {
    pub fn new(client: reqwest::Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
            speaker_wav: DEFAULT_SPEAKER_WAV.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_speaker_wav(mut self, speaker_wav: impl Into<String>) -> Self {
        self.speaker_wav = speaker_wav.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for XttsSynthesizer {
    fn provider(&self) -> &'static str {
        "xtts"
    }

    async fn synthesize(&self, text: &str) -> LipsyncResult<SynthesizedAudio> {
        let url = format!("{}/tts_to_audio/", self.server_url);
        let resp = self
            .client
            .post(&url)
            .json(&TtsToAudioRequest {
                text,
                speaker_wav: &self.speaker_wav,
                language: &self.language,
            })
            .send()
            .await
            .map_err(|e| transport_error("XTTS", e))?;

        if !resp.status().is_success() {
            return Err(status_error("XTTS", resp).await);
        }
        let bytes = resp.bytes().await.map_err(|e| transport_error("XTTS", e))?;
        tracing::debug!(bytes = bytes.len(), "xtts audio received");
        Ok(SynthesizedAudio::new(bytes.to_vec(), "audio/wav"))
    }
}
