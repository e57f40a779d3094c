//! Service configuration from command-line flags with environment-variable fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::LipsyncResult;
use crate::pipeline::{DEFAULT_CANVAS_SIZE, DEFAULT_FPS, PipelineConfig};
use crate::ratelimit::{DEFAULT_LIMIT, RateLimiter};
use crate::render::FrameStyle;
use crate::tts::{TtsProvider, TtsSettings};

/// Rendering and media-tool settings.
#[derive(clap::Args, Clone, Debug)]
pub struct MediaArgs {
    /// Directory holding `character.png`, the mouth sprites and an optional `fonts/` dir.
    #[arg(long, env = "LIPSYNC_ASSETS_DIR", default_value = "assets")]
    pub assets_dir: PathBuf,

    #[arg(long, env = "LIPSYNC_FPS", default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    #[arg(long, env = "LIPSYNC_WIDTH", default_value_t = DEFAULT_CANVAS_SIZE)]
    pub width: u32,

    #[arg(long, env = "LIPSYNC_HEIGHT", default_value_t = DEFAULT_CANVAS_SIZE)]
    pub height: u32,

    /// Parent directory for per-request scratch space (system temp dir if unset).
    #[arg(long, env = "LIPSYNC_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    #[arg(long, env = "LIPSYNC_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: String,

    #[arg(long, env = "LIPSYNC_FFPROBE", default_value = "ffprobe")]
    pub ffprobe: String,

    /// Per-invocation budget for ffmpeg/ffprobe, in seconds (0 disables the limit).
    #[arg(long, env = "LIPSYNC_COMMAND_TIMEOUT_SECS", default_value_t = 120)]
    pub command_timeout_secs: u64,

    /// Do not burn the phrase into the frames.
    #[arg(long)]
    pub no_subtitles: bool,
}

impl MediaArgs {
    pub fn pipeline_config(&self) -> LipsyncResult<PipelineConfig> {
        let config = PipelineConfig {
            fps: Fps::new(self.fps, 1)?,
            canvas: Canvas::new(self.width, self.height)?,
            style: FrameStyle {
                subtitles: !self.no_subtitles,
                ..FrameStyle::default()
            },
            scratch_root: self.scratch_dir.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            command_timeout: (self.command_timeout_secs > 0)
                .then(|| Duration::from_secs(self.command_timeout_secs)),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Speech provider selection and credentials.
#[derive(clap::Args, Clone, Debug)]
pub struct TtsArgs {
    /// `xtts`, `elevenlabs` or `minimax`.
    #[arg(long, env = "TTS_PROVIDER", default_value = "xtts")]
    pub tts_provider: TtsProvider,

    #[arg(long, env = "XTTS_SERVER_URL")]
    pub xtts_server_url: Option<String>,

    #[arg(long, env = "XTTS_SPEAKER_WAV")]
    pub xtts_speaker_wav: Option<String>,

    #[arg(long, env = "XTTS_LANGUAGE")]
    pub xtts_language: Option<String>,

    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub elevenlabs_api_key: Option<String>,

    #[arg(long, env = "ELEVENLABS_VOICE_ID")]
    pub elevenlabs_voice_id: Option<String>,

    #[arg(long, env = "MINIMAX_API_KEY", hide_env_values = true)]
    pub minimax_api_key: Option<String>,

    #[arg(long, env = "MINIMAX_GROUP_ID")]
    pub minimax_group_id: Option<String>,

    #[arg(long, env = "MINIMAX_VOICE_ID")]
    pub minimax_voice_id: Option<String>,

    #[arg(long, env = "MINIMAX_MODEL")]
    pub minimax_model: Option<String>,

    /// HTTP timeout for provider calls, in seconds.
    #[arg(long, env = "TTS_TIMEOUT_SECS", default_value_t = 120)]
    pub tts_timeout_secs: u64,
}

impl TtsArgs {
    pub fn settings(&self) -> TtsSettings {
        TtsSettings {
            xtts_server_url: self.xtts_server_url.clone(),
            xtts_speaker_wav: self.xtts_speaker_wav.clone(),
            xtts_language: self.xtts_language.clone(),
            elevenlabs_api_key: self.elevenlabs_api_key.clone(),
            elevenlabs_voice_id: self.elevenlabs_voice_id.clone(),
            minimax_api_key: self.minimax_api_key.clone(),
            minimax_group_id: self.minimax_group_id.clone(),
            minimax_voice_id: self.minimax_voice_id.clone(),
            minimax_model: self.minimax_model.clone(),
            timeout: Some(Duration::from_secs(self.tts_timeout_secs.max(1))),
        }
    }
}

/// Everything `lipsync serve` needs.
#[derive(clap::Args, Clone, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "LIPSYNC_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Synthesis requests allowed per client per window.
    #[arg(long, env = "LIPSYNC_RATE_LIMIT", default_value_t = DEFAULT_LIMIT)]
    pub rate_limit: u32,

    #[arg(long, env = "LIPSYNC_RATE_WINDOW_SECS", default_value_t = 24 * 60 * 60)]
    pub rate_window_secs: u64,

    #[command(flatten)]
    pub media: MediaArgs,

    #[command(flatten)]
    pub tts: TtsArgs,
}

impl ServeArgs {
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit, Duration::from_secs(self.rate_window_secs))
    }
}
