use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::foundation::core::{Canvas, FRAME_FILE_PATTERN, Fps, FrameIndex};
use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::process::{CommandRunner, CommandSpec};

/// One mux job: a directory of numbered PNG frames plus the speech track.
#[derive(Clone, Debug)]
pub struct EncodeJob {
    pub frames_dir: PathBuf,
    pub frame_count: u64,
    pub audio_path: PathBuf,
    pub canvas: Canvas,
    pub fps: Fps,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl EncodeJob {
    pub fn validate(&self) -> LipsyncResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(LipsyncError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(LipsyncError::validation("encode fps must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // yuv420p subsamples chroma 2x2.
            return Err(LipsyncError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.frame_count == 0 {
            return Err(LipsyncError::validation("encode needs at least one frame"));
        }
        Ok(())
    }

    /// The ffmpeg invocation: PNG sequence + audio in, h264/yuv420p + AAC out, trimmed to the
    /// shorter stream.
    pub fn command(&self, ffmpeg: &str) -> CommandSpec {
        CommandSpec::new(ffmpeg)
            .arg(if self.overwrite { "-y" } else { "-n" })
            .args([
                "-loglevel",
                "error",
                "-framerate",
                &self.fps.ffmpeg_rate(),
                "-i",
            ])
            .arg(self.frames_dir.join(FRAME_FILE_PATTERN))
            .arg("-i")
            .arg(&self.audio_path)
            .args([
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-shortest",
                "-movflags",
                "+faststart",
            ])
            .arg(&self.out_path)
    }
}

/// Muxes rendered frames with the audio track through the system `ffmpeg`.
pub struct VideoEncoder {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    timeout: Option<Duration>,
}

impl VideoEncoder {
    pub fn new(runner: Arc<dyn CommandRunner>, ffmpeg: impl Into<String>) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the encoder to completion. Any non-zero exit is an error.
    #[tracing::instrument(level = "debug", skip_all, fields(frames = job.frame_count))]
    pub async fn encode(&self, job: &EncodeJob) -> LipsyncResult<()> {
        job.validate()?;
        ensure_frames_written(&job.frames_dir, job.frame_count).await?;

        if !job.overwrite && tokio::fs::try_exists(&job.out_path).await.unwrap_or(false) {
            return Err(LipsyncError::validation(format!(
                "output file '{}' already exists",
                job.out_path.display()
            )));
        }

        let spec = job.command(&self.ffmpeg).timeout(self.timeout);
        let out = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| LipsyncError::encoding(e.to_string()))?;

        let stderr = out.stderr_lossy();
        if !out.success() {
            return Err(LipsyncError::encoding(format!(
                "ffmpeg exited with status {}: {}",
                out.code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr
            )));
        }
        if !stderr.is_empty() {
            tracing::debug!(stderr = %stderr, "ffmpeg diagnostics");
        }
        Ok(())
    }
}

/// Check that frames `0..frame_count` are all on disk before the encoder reads them.
async fn ensure_frames_written(frames_dir: &Path, frame_count: u64) -> LipsyncResult<()> {
    let mut present = 0u64;
    let mut rd = tokio::fs::read_dir(frames_dir).await.map_err(|e| {
        LipsyncError::encoding(format!(
            "failed to read frame directory '{}': {e}",
            frames_dir.display()
        ))
    })?;
    while let Some(entry) = rd
        .next_entry()
        .await
        .map_err(|e| LipsyncError::encoding(format!("failed to list frames: {e}")))?
    {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("frame_") && name.ends_with(".png") {
            present += 1;
        }
    }

    let last = frames_dir.join(FrameIndex(frame_count.saturating_sub(1)).file_name());
    if present != frame_count || !tokio::fs::try_exists(&last).await.unwrap_or(false) {
        return Err(LipsyncError::encoding(format!(
            "expected {frame_count} frames in '{}', found {present}",
            frames_dir.display()
        )));
    }
    Ok(())
}
