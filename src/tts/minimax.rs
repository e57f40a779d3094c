use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::{SpeechSynthesizer, SynthesizedAudio, status_error, transport_error};
use crate::foundation::error::{LipsyncError, LipsyncResult};

pub const DEFAULT_BASE_URL: &str = "https://api.minimaxi.chat/v1";
pub const DEFAULT_VOICE_ID: &str = "default";
pub const DEFAULT_MODEL: &str = "speech-02-hd";

#[derive(Serialize)]
struct VoiceSetting<'a> {
    voice_id: &'a str,
    speed: f32,
    vol: f32,
    pitch: i32,
}

#[derive(Serialize)]
struct AudioSetting {
    sample_rate: u32,
    bitrate: u32,
    format: &'static str,
}

#[derive(Serialize)]
struct T2aRequest<'a> {
    model: &'a str,
    text: &'a str,
    voice_setting: VoiceSetting<'a>,
    audio_setting: AudioSetting,
}

#[derive(Deserialize, Default)]
struct BaseResp {
    #[serde(default)]
    status_code: i32,
    #[serde(default)]
    status_msg: String,
}

#[derive(Deserialize)]
struct T2aResponse {
    #[serde(default)]
    base_resp: Option<BaseResp>,
    #[serde(default)]
    audio_file: Option<String>,
}

/// MiniMax `t2a_v2` speech synthesis. Audio comes back base64-encoded inside JSON.
#[derive(Clone)]
pub struct MiniMaxSynthesizer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    group_id: String,
    voice_id: String,
    model: String,
}

impl MiniMaxSynthesizer {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            group_id: group_id.into(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for MiniMaxSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniMaxSynthesizer")
            .field("base_url", &self.base_url)
            .field("group_id", &self.group_id)
            .field("voice_id", &self.voice_id)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SpeechSynthesizer for MiniMaxSynthesizer {
    fn provider(&self) -> &'static str {
        "minimax"
    }

    async fn synthesize(&self, text: &str) -> LipsyncResult<SynthesizedAudio> {
        let url = format!("{}/t2a_v2", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("GroupId", self.group_id.as_str())])
            .bearer_auth(&self.api_key)
            .json(&T2aRequest {
                model: &self.model,
                text,
                voice_setting: VoiceSetting {
                    voice_id: &self.voice_id,
                    speed: 1.0,
                    vol: 1.0,
                    pitch: 0,
                },
                audio_setting: AudioSetting {
                    sample_rate: 32000,
                    bitrate: 128000,
                    format: "mp3",
                },
            })
            .send()
            .await
            .map_err(|e| transport_error("MiniMax", e))?;

        if !resp.status().is_success() {
            return Err(status_error("MiniMax", resp).await);
        }
        let body: T2aResponse = resp
            .json()
            .await
            .map_err(|e| transport_error("MiniMax", e))?;
        decode_response(body)
    }
}

fn decode_response(body: T2aResponse) -> LipsyncResult<SynthesizedAudio> {
    let base = body.base_resp.unwrap_or(BaseResp {
        status_code: -1,
        status_msg: String::new(),
    });
    if base.status_code != 0 {
        let msg = if base.status_msg.is_empty() {
            "Unknown error"
        } else {
            base.status_msg.as_str()
        };
        return Err(LipsyncError::synthesis(format!(
            "MiniMax API error ({}): {msg}",
            base.status_code
        )));
    }

    let encoded = body
        .audio_file
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LipsyncError::synthesis("MiniMax response carried no audio data"))?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LipsyncError::synthesis(format!("MiniMax audio is not valid base64: {e}")))?;
    Ok(SynthesizedAudio::new(bytes, "audio/mpeg"))
}
