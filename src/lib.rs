#![forbid(unsafe_code)]

pub mod audio;
pub mod config;
pub mod encode;
pub mod foundation;
pub mod pipeline;
pub mod process;
pub mod ratelimit;
pub mod render;
pub mod scratch;
pub mod server;
pub mod tts;
pub mod viseme;

pub use audio::{AudioAsset, LoudnessSeries, VolumeAnalyzer};
pub use encode::{EncodeJob, VideoEncoder};
pub use foundation::core::{Canvas, Fps, FrameIndex};
pub use foundation::error::{LipsyncError, LipsyncResult};
pub use pipeline::{JobStage, PipelineConfig, RenderJob, RenderOutput, RenderStats, VideoPipeline};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use ratelimit::{RateDecision, RateLimiter};
pub use render::{CharacterAssets, FrameCompositor, FrameStyle, SubtitleRenderer};
pub use scratch::ScratchDir;
pub use server::{AppState, router};
pub use tts::{SpeechSynthesizer, SynthesizedAudio, TtsProvider};
pub use viseme::Viseme;
