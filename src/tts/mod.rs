//! Text-to-speech providers.
//!
//! The rest of the crate depends only on [`SpeechSynthesizer`]; the concrete provider is picked
//! once from [`TtsSettings`] when the service starts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::audio::AudioAsset;
use crate::foundation::error::{LipsyncError, LipsyncResult};

pub mod elevenlabs;
pub mod minimax;
pub mod xtts;

pub use elevenlabs::ElevenLabsSynthesizer;
pub use minimax::MiniMaxSynthesizer;
pub use xtts::XttsSynthesizer;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Encoded speech returned by a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl SynthesizedAudio {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    pub fn into_asset(self) -> AudioAsset {
        AudioAsset::new(self.bytes, Some(self.content_type))
    }
}

/// Turns text into encoded speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Short provider name reported to API clients.
    fn provider(&self) -> &'static str;

    async fn synthesize(&self, text: &str) -> LipsyncResult<SynthesizedAudio>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    Xtts,
    ElevenLabs,
    MiniMax,
}

impl TtsProvider {
    pub fn name(self) -> &'static str {
        match self {
            Self::Xtts => "xtts",
            Self::ElevenLabs => "elevenlabs",
            Self::MiniMax => "minimax",
        }
    }
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TtsProvider {
    type Err = LipsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xtts" => Ok(Self::Xtts),
            "elevenlabs" | "eleven" => Ok(Self::ElevenLabs),
            "minimax" => Ok(Self::MiniMax),
            other => Err(LipsyncError::validation(format!(
                "unknown TTS provider '{other}' (expected xtts, elevenlabs or minimax)"
            ))),
        }
    }
}

/// Everything needed to construct any provider. Unset optional values fall back to the
/// provider's defaults.
#[derive(Clone, Debug, Default)]
pub struct TtsSettings {
    pub xtts_server_url: Option<String>,
    pub xtts_speaker_wav: Option<String>,
    pub xtts_language: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub minimax_api_key: Option<String>,
    pub minimax_group_id: Option<String>,
    pub minimax_voice_id: Option<String>,
    pub minimax_model: Option<String>,
    pub timeout: Option<Duration>,
}

/// Construct the configured provider, or report which setting is missing.
pub fn build_synthesizer(
    provider: TtsProvider,
    settings: &TtsSettings,
) -> LipsyncResult<Arc<dyn SpeechSynthesizer>> {
    let client = http_client(settings.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT))?;
    let synth: Arc<dyn SpeechSynthesizer> = match provider {
        TtsProvider::Xtts => {
            let url = required(&settings.xtts_server_url, "XTTS_SERVER_URL")?;
            let mut s = XttsSynthesizer::new(client, url);
            if let Some(speaker) = non_empty(&settings.xtts_speaker_wav) {
                s = s.with_speaker_wav(speaker);
            }
            if let Some(lang) = non_empty(&settings.xtts_language) {
                s = s.with_language(lang);
            }
            Arc::new(s)
        }
        TtsProvider::ElevenLabs => {
            let key = required(&settings.elevenlabs_api_key, "ELEVENLABS_API_KEY")?;
            let voice = required(&settings.elevenlabs_voice_id, "ELEVENLABS_VOICE_ID")?;
            Arc::new(ElevenLabsSynthesizer::new(client, key, voice))
        }
        TtsProvider::MiniMax => {
            let key = required(&settings.minimax_api_key, "MINIMAX_API_KEY")?;
            let group = required(&settings.minimax_group_id, "MINIMAX_GROUP_ID")?;
            let mut s = MiniMaxSynthesizer::new(client, key, group);
            if let Some(voice) = non_empty(&settings.minimax_voice_id) {
                s = s.with_voice_id(voice);
            }
            if let Some(model) = non_empty(&settings.minimax_model) {
                s = s.with_model(model);
            }
            Arc::new(s)
        }
    };
    Ok(synth)
}

pub(crate) fn http_client(timeout: Duration) -> LipsyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LipsyncError::synthesis(format!("failed to build http client: {e}")))
}

/// Turn a transport failure into a synthesis error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> LipsyncError {
    LipsyncError::synthesis(format!("{provider} request failed: {err}"))
}

/// Consume a non-2xx response into a synthesis error carrying its body.
pub(crate) async fn status_error(provider: &str, resp: reqwest::Response) -> LipsyncError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    LipsyncError::synthesis(format!(
        "{provider} API error ({}): {}",
        status.as_u16(),
        body.trim()
    ))
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(v: &'a Option<String>, name: &str) -> LipsyncResult<&'a str> {
    non_empty(v).ok_or_else(|| LipsyncError::synthesis(format!("{name} not configured")))
}
