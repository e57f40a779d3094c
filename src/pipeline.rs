use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context as _;

use crate::audio::{AnalysisInput, AudioAsset, LoudnessSeries, VolumeAnalyzer, probe_duration};
use crate::encode::{EncodeJob, VideoEncoder};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::process::CommandRunner;
use crate::render::{CharacterAssets, FrameCompositor, FrameStyle, SubtitleRenderer};
use crate::scratch::ScratchDir;
use crate::viseme::Viseme;

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_CANVAS_SIZE: u32 = 1080;
/// Longest accepted phrase, in characters.
pub const MAX_TEXT_CHARS: usize = 200;
const OUTPUT_FILE: &str = "output.mp4";
const FRAMES_DIR: &str = "frames";

/// Reject empty, blank or overlong phrases.
pub fn validate_text(text: &str) -> LipsyncResult<()> {
    if text.is_empty() {
        return Err(LipsyncError::validation("Text is required"));
    }
    if text.trim().is_empty() {
        return Err(LipsyncError::validation("Text is blank"));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(LipsyncError::validation(format!(
            "Text too long (max {MAX_TEXT_CHARS} characters)"
        )));
    }
    Ok(())
}

/// Static settings shared by every render.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub fps: Fps,
    pub canvas: Canvas,
    pub style: FrameStyle,
    /// Parent of the per-request scratch directories; the system temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Wall-clock budget for each external tool invocation.
    pub command_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: Fps {
                num: DEFAULT_FPS,
                den: 1,
            },
            canvas: Canvas {
                width: DEFAULT_CANVAS_SIZE,
                height: DEFAULT_CANVAS_SIZE,
            },
            style: FrameStyle::default(),
            scratch_root: None,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            command_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> LipsyncResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(LipsyncError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            return Err(LipsyncError::validation(
                "canvas width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(LipsyncError::validation("fps must be non-zero"));
        }
        if self.ffmpeg.trim().is_empty() || self.ffprobe.trim().is_empty() {
            return Err(LipsyncError::validation(
                "ffmpeg/ffprobe program names must be non-empty",
            ));
        }
        Ok(())
    }
}

/// Where a [`RenderJob`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStage {
    Start,
    AudioAcquired,
    DurationProbed,
    Analyzed,
    FramesRendered,
    Encoded,
    Delivered,
    Failed,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::AudioAcquired => "audio_acquired",
            Self::DurationProbed => "duration_probed",
            Self::Analyzed => "analyzed",
            Self::FramesRendered => "frames_rendered",
            Self::Encoded => "encoded",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_total: u64,
    /// Frames that needed compositing; the rest reused an identical earlier frame.
    pub frames_rendered: u64,
    pub frames_reused: u64,
}

/// Per-request aggregate, populated stage by stage.
#[derive(Debug)]
pub struct RenderJob {
    pub text: String,
    pub audio: AudioAsset,
    pub fps: Fps,
    pub canvas: Canvas,
    pub duration_secs: Option<f64>,
    pub frame_count: u64,
    pub loudness: Option<LoudnessSeries>,
    pub stats: RenderStats,
    stage: JobStage,
}

impl RenderJob {
    pub fn new(text: impl Into<String>, audio: AudioAsset, fps: Fps, canvas: Canvas) -> Self {
        Self {
            text: text.into(),
            audio,
            fps,
            canvas,
            duration_secs: None,
            frame_count: 0,
            loudness: None,
            stats: RenderStats::default(),
            stage: JobStage::Start,
        }
    }

    fn advance(&mut self, next: JobStage) {
        tracing::debug!(from = %self.stage, to = %next, "render job stage");
        self.stage = next;
    }

    fn fail(&mut self, err: &LipsyncError) {
        tracing::error!(stage = %self.stage, error = %err, "render job failed");
        self.stage = JobStage::Failed;
    }
}

/// Result of a successful render.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    pub video: Vec<u8>,
    pub duration_secs: f64,
    pub frame_count: u64,
    pub stats: RenderStats,
}

/// Audio + text in, MP4 bytes out.
///
/// Each call works inside its own [`ScratchDir`], which is gone by the time the call returns
/// whatever the outcome.
pub struct VideoPipeline {
    runner: Arc<dyn CommandRunner>,
    compositor: Arc<FrameCompositor>,
    analyzer: VolumeAnalyzer,
    encoder: VideoEncoder,
    config: PipelineConfig,
}

impl VideoPipeline {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        assets: &CharacterAssets,
        subtitles: SubtitleRenderer,
        config: PipelineConfig,
    ) -> LipsyncResult<Self> {
        config.validate()?;
        let compositor = FrameCompositor::new(assets, config.canvas, config.style, subtitles);
        let analyzer = VolumeAnalyzer::ffmpeg(runner.clone(), &config.ffmpeg, config.command_timeout);
        let encoder = VideoEncoder::new(runner.clone(), config.ffmpeg.clone())
            .with_timeout(config.command_timeout);

        Ok(Self {
            runner,
            compositor: Arc::new(compositor),
            analyzer,
            encoder,
            config,
        })
    }

    /// Replace the loudness strategy chain.
    pub fn with_analyzer(mut self, analyzer: VolumeAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub async fn render(&self, text: &str, audio: AudioAsset) -> LipsyncResult<Vec<u8>> {
        self.render_with_stats(text, audio).await.map(|out| out.video)
    }

    #[tracing::instrument(skip_all, fields(chars = text.chars().count(), bytes = audio.bytes.len()))]
    pub async fn render_with_stats(
        &self,
        text: &str,
        audio: AudioAsset,
    ) -> LipsyncResult<RenderOutput> {
        validate_text(text)?;
        if audio.bytes.is_empty() {
            return Err(LipsyncError::validation("audio payload is empty"));
        }

        let scratch = ScratchDir::create(self.config.scratch_root.as_deref())?;
        let mut job = RenderJob::new(text, audio, self.config.fps, self.config.canvas);

        let result = self.run_stages(&mut job, &scratch).await;
        match &result {
            Ok(out) => {
                job.advance(JobStage::Delivered);
                tracing::info!(
                    frames = out.frame_count,
                    rendered = out.stats.frames_rendered,
                    bytes = out.video.len(),
                    "video delivered"
                );
            }
            Err(err) => job.fail(err),
        }
        // Removing a directory of frames is blocking filesystem work.
        if let Err(e) = tokio::task::spawn_blocking(move || scratch.close()).await {
            tracing::warn!(error = %e, "scratch cleanup task failed");
        }
        result
    }

    async fn run_stages(
        &self,
        job: &mut RenderJob,
        scratch: &ScratchDir,
    ) -> LipsyncResult<RenderOutput> {
        let audio_path = scratch.join(format!("audio.{}", job.audio.file_extension()));
        tokio::fs::write(&audio_path, &job.audio.bytes)
            .await
            .with_context(|| format!("write audio to '{}'", audio_path.display()))?;
        job.advance(JobStage::AudioAcquired);

        let duration = probe_duration(
            self.runner.as_ref(),
            &self.config.ffprobe,
            &audio_path,
            self.config.command_timeout,
        )
        .await?;
        let frame_count = job.fps.frame_count_for(duration)?;
        job.duration_secs = Some(duration);
        job.frame_count = frame_count;
        job.advance(JobStage::DurationProbed);
        tracing::debug!(duration, frame_count, "audio probed");

        let frames = usize::try_from(frame_count)
            .map_err(|_| LipsyncError::media(format!("frame count {frame_count} too large")))?;
        let series = self
            .analyzer
            .analyze(&AnalysisInput {
                audio_path: &audio_path,
                duration_secs: duration,
                frame_count: frames,
            })
            .await;
        job.advance(JobStage::Analyzed);

        let frames_dir = scratch.join(FRAMES_DIR);
        tokio::fs::create_dir(&frames_dir)
            .await
            .with_context(|| format!("create frame directory '{}'", frames_dir.display()))?;
        let compositor = Arc::clone(&self.compositor);
        let text = job.text.clone();
        let dir = frames_dir.clone();
        let levels = series.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        // Dropped before the scratch directory when the request future is dropped.
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancel));
        let stats = tokio::task::spawn_blocking(move || {
            write_frames(&compositor, &dir, &text, &levels, &cancel)
        })
        .await
        .map_err(|e| LipsyncError::render(format!("frame rendering task failed: {e}")))??;
        job.loudness = Some(series);
        job.stats = stats;
        job.advance(JobStage::FramesRendered);

        let out_path = scratch.join(OUTPUT_FILE);
        self.encoder
            .encode(&EncodeJob {
                frames_dir,
                frame_count,
                audio_path,
                canvas: job.canvas,
                fps: job.fps,
                out_path: out_path.clone(),
                overwrite: true,
            })
            .await?;
        job.advance(JobStage::Encoded);

        let video = tokio::fs::read(&out_path)
            .await
            .with_context(|| format!("read encoded video '{}'", out_path.display()))?;
        if video.is_empty() {
            return Err(LipsyncError::encoding("encoder produced an empty file"));
        }

        Ok(RenderOutput {
            video,
            duration_secs: duration,
            frame_count,
            stats,
        })
    }
}

/// Raises its flag when dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Write one PNG per loudness value. Each distinct viseme is composited and encoded once.
///
/// `cancel` is checked before every frame; once it is set no further frame is written.
pub fn write_frames(
    compositor: &FrameCompositor,
    frames_dir: &Path,
    text: &str,
    series: &LoudnessSeries,
    cancel: &AtomicBool,
) -> LipsyncResult<RenderStats> {
    let subtitle = compositor.subtitle_overlay(text)?;
    let mut encoded: [Option<Vec<u8>>; Viseme::COUNT] = std::array::from_fn(|_| None);
    let mut stats = RenderStats::default();

    for (i, &level) in series.values().iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(LipsyncError::render(format!(
                "frame rendering cancelled after {i} frames"
            )));
        }
        let viseme = Viseme::from_loudness(level);
        let slot = viseme as usize;
        if encoded[slot].is_none() {
            let frame = compositor.compose(viseme, subtitle.as_ref());
            encoded[slot] = Some(crate::render::encode_png(&frame)?);
            stats.frames_rendered += 1;
        } else {
            stats.frames_reused += 1;
        }
        let png = encoded[slot].as_deref().unwrap_or_default();

        let path = frames_dir.join(FrameIndex(i as u64).file_name());
        std::fs::write(&path, png)
            .with_context(|| format!("write frame '{}'", path.display()))?;
        stats.frames_total += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn compositor() -> FrameCompositor {
        let character = RgbaImage::from_pixel(10, 10, Rgba([200, 0, 0, 255]));
        let mouths =
            Viseme::ALL.map(|v| RgbaImage::from_pixel(4, 4, Rgba([0, 50 * v as u8, 255, 255])));
        FrameCompositor::new(
            &CharacterAssets::from_images(character, mouths),
            Canvas::new(64, 64).unwrap(),
            FrameStyle {
                subtitles: false,
                ..FrameStyle::default()
            },
            SubtitleRenderer::new(Arc::new(usvg::fontdb::Database::new())),
        )
    }

    #[test]
    fn text_validation_limits() {
        assert!(validate_text("Salut").is_ok());
        let empty = validate_text("").unwrap_err();
        assert!(empty.to_string().contains("Text is required"));
        let blank = validate_text(" \t\n").unwrap_err();
        assert!(blank.to_string().contains("Text is blank"), "{blank}");
        assert!(validate_text(&"a".repeat(MAX_TEXT_CHARS)).is_ok());
        let err = validate_text(&"a".repeat(MAX_TEXT_CHARS + 1)).unwrap_err();
        assert!(err.to_string().contains("max 200"));
        // Characters, not bytes.
        assert!(validate_text(&"é".repeat(MAX_TEXT_CHARS)).is_ok());
    }

    #[test]
    fn config_validation_mirrors_encoder_constraints() {
        assert!(PipelineConfig::default().validate().is_ok());
        let odd = PipelineConfig {
            canvas: Canvas {
                width: 1081,
                height: 1080,
            },
            ..PipelineConfig::default()
        };
        assert!(odd.validate().is_err());
        let no_fps = PipelineConfig {
            fps: Fps { num: 0, den: 1 },
            ..PipelineConfig::default()
        };
        assert!(no_fps.validate().is_err());
    }

    #[test]
    fn frames_are_numbered_and_deduplicated_per_viseme() {
        let dir = tempfile::tempdir().unwrap();
        let series =
            LoudnessSeries::from_measurements(&[0.0, 0.1, 0.5, 0.9, 0.5, 0.0, 0.3], 7).unwrap();

        let stats =
            write_frames(&compositor(), dir.path(), "", &series, &AtomicBool::new(false)).unwrap();
        assert_eq!(
            stats,
            RenderStats {
                frames_total: 7,
                frames_rendered: 4,
                frames_reused: 3,
            }
        );

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names.first().unwrap(), "frame_00000.png");
        assert_eq!(names.last().unwrap(), "frame_00006.png");
        assert_eq!(names.len(), 7);

        let f0 = std::fs::read(dir.path().join("frame_00000.png")).unwrap();
        let f5 = std::fs::read(dir.path().join("frame_00005.png")).unwrap();
        let f3 = std::fs::read(dir.path().join("frame_00003.png")).unwrap();
        assert_eq!(f0, f5);
        assert_ne!(f0, f3);
    }

    #[test]
    fn cancelled_writer_stops_before_the_next_frame() {
        let dir = tempfile::tempdir().unwrap();
        let series = LoudnessSeries::from_measurements(&[0.5; 30], 30).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));

        drop(CancelOnDrop(Arc::clone(&cancel)));
        assert!(cancel.load(Ordering::Relaxed));

        let err = write_frames(&compositor(), dir.path(), "", &series, &cancel).unwrap_err();
        assert!(matches!(err, LipsyncError::Render(_)), "{err}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn job_stage_follows_advance_and_fail() {
        let mut job = RenderJob::new(
            "Salut",
            AudioAsset::new(vec![1], None),
            Fps::new(30, 1).unwrap(),
            Canvas::new(64, 64).unwrap(),
        );
        assert_eq!(job.stage, JobStage::Start);
        job.advance(JobStage::AudioAcquired);
        assert_eq!(job.stage, JobStage::AudioAcquired);
        job.fail(&LipsyncError::media("probe failed"));
        assert_eq!(job.stage, JobStage::Failed);
        assert!(job.stage.is_terminal());
    }

    #[test]
    fn stages_render_as_snake_case() {
        assert_eq!(JobStage::FramesRendered.to_string(), "frames_rendered");
        assert!(JobStage::Failed.is_terminal());
        assert!(!JobStage::Encoded.is_terminal());
    }
}
