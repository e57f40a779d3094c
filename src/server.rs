//! HTTP surface.
//!
//! - `POST /generate`       - phrase to speech, `{audio, contentType, remaining, provider}`
//! - `POST /generate-video` - phrase (+ optional base64 audio) to an MP4 download
//! - `GET  /health`         - liveness probe

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audio::AudioAsset;
use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::pipeline::{VideoPipeline, validate_text};
use crate::ratelimit::RateLimiter;
use crate::tts::SpeechSynthesizer;

pub const RATE_LIMIT_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMITED_MESSAGE: &str = "Limite atteinte. Reviens demain!";
const AUDIO_FAILURE_MESSAGE: &str = "Failed to generate audio";
const VIDEO_FAILURE_MESSAGE: &str = "Failed to generate video";
const VIDEO_DISPOSITION: &str = "attachment; filename=\"lipsync.mp4\"";
/// Request bodies carry base64 audio, so the default 2 MiB limit is too small.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared, request-independent service state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    /// `None` when the configured provider could not be built; synthesis then fails per request.
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub provider: String,
    pub pipeline: Arc<VideoPipeline>,
}

impl AppState {
    pub fn new(
        limiter: RateLimiter,
        synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
        provider: impl Into<String>,
        pipeline: VideoPipeline,
    ) -> Self {
        Self {
            limiter: Arc::new(limiter),
            synthesizer,
            provider: provider.into(),
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/generate-video", post(generate_video))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, provider = %state.provider, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

/// Client identity used for rate limiting: first `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

/// JSON error response. Internal failures are logged and replaced by a generic message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn from_error(err: LipsyncError, generic: &'static str) -> Self {
        match err {
            LipsyncError::Validation(msg) => Self {
                status: StatusCode::BAD_REQUEST,
                body: json!({ "error": msg }),
            },
            LipsyncError::RateLimited => Self {
                status: StatusCode::TOO_MANY_REQUESTS,
                body: json!({ "error": RATE_LIMITED_MESSAGE, "remaining": 0 }),
            },
            other => {
                tracing::error!(error = %other, "request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: json!({ "error": generic }),
                }
            }
        }
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": msg.into() }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    text: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoRequest {
    #[serde(default)]
    text: Option<serde_json::Value>,
    #[serde(default)]
    audio_base64: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    audio: String,
    content_type: String,
    remaining: u32,
    provider: String,
}

async fn health() -> &'static str {
    "ok"
}

fn body_text(text: Option<serde_json::Value>) -> Result<String, ApiError> {
    let text = match text {
        Some(serde_json::Value::String(s)) => s,
        _ => return Err(ApiError::bad_request("Text is required")),
    };
    validate_text(&text).map_err(|e| match e {
        LipsyncError::Validation(msg) => ApiError::bad_request(msg),
        other => ApiError::bad_request(other.to_string()),
    })?;
    Ok(text)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected request body");
        ApiError::bad_request("Invalid JSON body")
    })
}

/// Count one synthesis against `identity` and synthesize `text`.
async fn synthesize_limited(
    state: &AppState,
    identity: &str,
    text: &str,
) -> LipsyncResult<(crate::tts::SynthesizedAudio, u32)> {
    let decision = state.limiter.check(identity);
    if !decision.allowed {
        return Err(LipsyncError::RateLimited);
    }

    let synthesizer = state.synthesizer.as_ref().ok_or_else(|| {
        LipsyncError::synthesis(format!("TTS provider '{}' is not configured", state.provider))
    })?;
    let audio = synthesizer.synthesize(text).await?;
    tracing::info!(
        provider = synthesizer.provider(),
        bytes = audio.bytes.len(),
        remaining = decision.remaining,
        "speech synthesized"
    );
    Ok((audio, decision.remaining))
}

fn remaining_header(remaining: u32) -> [(header::HeaderName, HeaderValue); 1] {
    [(
        header::HeaderName::from_static(RATE_LIMIT_HEADER),
        HeaderValue::from(remaining),
    )]
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let text = body_text(req.text)?;
    let identity = client_identity(&headers);

    let (audio, remaining) = synthesize_limited(&state, &identity, &text)
        .await
        .map_err(|e| ApiError::from_error(e, AUDIO_FAILURE_MESSAGE))?;

    let provider = state
        .synthesizer
        .as_ref()
        .map(|s| s.provider().to_string())
        .unwrap_or_else(|| state.provider.clone());
    let resp = GenerateResponse {
        audio: STANDARD.encode(&audio.bytes),
        content_type: audio.content_type,
        remaining,
        provider,
    };
    Ok((remaining_header(remaining), Json(resp)).into_response())
}

async fn generate_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let req = json_body(body)?;
    let text = body_text(req.text)?;

    let supplied = match req.audio_base64.as_deref().map(str::trim) {
        Some(encoded) => {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|_| ApiError::bad_request("Invalid audio payload"))?;
            if bytes.is_empty() {
                return Err(ApiError::bad_request("Invalid audio payload"));
            }
            Some(AudioAsset::new(bytes, None))
        }
        None => None,
    };

    let (audio, remaining) = match supplied {
        Some(asset) => (asset, None),
        None => {
            let identity = client_identity(&headers);
            let (audio, remaining) = synthesize_limited(&state, &identity, &text)
                .await
                .map_err(|e| ApiError::from_error(e, VIDEO_FAILURE_MESSAGE))?;
            (audio.into_asset(), Some(remaining))
        }
    };

    let video = state
        .pipeline
        .render(&text, audio)
        .await
        .map_err(|e| ApiError::from_error(e, VIDEO_FAILURE_MESSAGE))?;

    let mut resp = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(VIDEO_DISPOSITION),
            ),
        ],
        Bytes::from(video),
    )
        .into_response();
    if let Some(remaining) = remaining {
        let [(name, value)] = remaining_header(remaining);
        resp.headers_mut().insert(name, value);
    }
    Ok(resp)
}
