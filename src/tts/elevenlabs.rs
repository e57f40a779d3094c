use async_trait::async_trait;
use serde::Serialize;

use super::{SpeechSynthesizer, SynthesizedAudio, status_error, transport_error};
use crate::foundation::error::LipsyncResult;

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";
pub const MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs text-to-speech. Returns MP3 audio.
#[derive(Clone)]
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for ElevenLabsSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsSynthesizer")
            .field("base_url", &self.base_url)
            .field("voice_id", &self.voice_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn provider(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> LipsyncResult<SynthesizedAudio> {
        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice_id);
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&TextToSpeechRequest {
                text,
                model_id: MODEL_ID,
                voice_settings: VoiceSettings {
                    stability: 0.5,
                    similarity_boost: 0.75,
                },
            })
            .send()
            .await
            .map_err(|e| transport_error("ElevenLabs", e))?;

        if !resp.status().is_success() {
            return Err(status_error("ElevenLabs", resp).await);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error("ElevenLabs", e))?;
        Ok(SynthesizedAudio::new(bytes.to_vec(), "audio/mpeg"))
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::{Json, Router, routing::post};

    use super::*;
    use crate::tts::test_support::spawn_mock;

    #[tokio::test]
    async fn sends_key_model_and_voice_settings() {
        let router = Router::new().route(
            "/text-to-speech/{voice}",
            post(
                |Path(voice): Path<String>,
                 headers: HeaderMap,
                 Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(voice, "voice-1");
                    assert_eq!(headers["xi-api-key"], "secret");
                    assert_eq!(body["model_id"], MODEL_ID);
                    assert_eq!(body["voice_settings"]["stability"], 0.5);
                    assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
                    b"ID3mp3".to_vec()
                },
            ),
        );
        let base = spawn_mock(router).await;

        let audio = ElevenLabsSynthesizer::new(reqwest::Client::new(), "secret", "voice-1")
            .with_base_url(base)
            .synthesize("Bonjour")
            .await
            .unwrap();
        assert_eq!(audio.bytes, b"ID3mp3");
        assert_eq!(audio.content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn unauthorized_is_reported() {
        let router = Router::new().route(
            "/text-to-speech/{voice}",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base = spawn_mock(router).await;

        let err = ElevenLabsSynthesizer::new(reqwest::Client::new(), "bad", "v")
            .with_base_url(base)
            .synthesize("Bonjour")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"), "{msg}");
        assert!(msg.contains("invalid api key"), "{msg}");
    }
}
