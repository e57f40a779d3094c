use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lipsync::config::{MediaArgs, ServeArgs};
use lipsync::render::build_fontdb;
use lipsync::{
    AppState, AudioAsset, CharacterAssets, FrameCompositor, SubtitleRenderer, SystemRunner,
    VideoPipeline, Viseme,
};

#[derive(Parser, Debug)]
#[command(name = "lipsync", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Render an MP4 from a phrase and a local audio file (requires `ffmpeg` and `ffprobe`).
    Render(RenderArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Phrase shown as the subtitle.
    #[arg(long)]
    text: String,

    /// Speech audio (any format ffmpeg can read).
    #[arg(long)]
    audio: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    media: MediaArgs,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[arg(long, default_value = "")]
    text: String,

    /// Mouth pose: closed, small, medium or o.
    #[arg(long, default_value = "closed")]
    viseme: Viseme,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    media: MediaArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Render(args) => cmd_render(args).await,
        Command::Frame(args) => cmd_frame(args),
    }
}

fn load_assets(dir: &Path) -> anyhow::Result<CharacterAssets> {
    CharacterAssets::load_dir(dir)
        .with_context(|| format!("load character sprites from '{}'", dir.display()))
}

fn build_pipeline(media: &MediaArgs) -> anyhow::Result<VideoPipeline> {
    let config = media.pipeline_config()?;
    let assets = load_assets(&media.assets_dir)?;
    let subtitles = SubtitleRenderer::new(build_fontdb(Some(&media.assets_dir)));
    Ok(VideoPipeline::new(
        Arc::new(SystemRunner),
        &assets,
        subtitles,
        config,
    )?)
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&args.media)?;
    for tool in [&args.media.ffmpeg, &args.media.ffprobe] {
        if !lipsync::process::is_tool_on_path(tool) {
            tracing::warn!(tool = %tool, "not found on PATH; video generation will fail");
        }
    }

    let provider = args.tts.tts_provider;
    let synthesizer = match lipsync::tts::build_synthesizer(provider, &args.tts.settings()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(provider = %provider, error = %e, "TTS provider unavailable");
            None
        }
    };

    let state = AppState::new(args.rate_limiter(), synthesizer, provider.name(), pipeline);
    lipsync::server::serve(args.bind, state).await
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&args.media)?;
    let bytes = tokio::fs::read(&args.audio)
        .await
        .with_context(|| format!("read audio '{}'", args.audio.display()))?;
    let content_type = match args.audio.extension().and_then(|e| e.to_str()) {
        Some("wav") => Some("audio/wav".to_string()),
        Some("mp3") => Some("audio/mpeg".to_string()),
        _ => None,
    };

    let out = pipeline
        .render_with_stats(&args.text, AudioAsset::new(bytes, content_type))
        .await?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &out.video)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} frames, {:.2}s, {} composited)",
        args.out.display(),
        out.frame_count,
        out.duration_secs,
        out.stats.frames_rendered
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let config = args.media.pipeline_config()?;
    let assets = load_assets(&args.media.assets_dir)?;
    let subtitles = SubtitleRenderer::new(build_fontdb(Some(&args.media.assets_dir)));
    let compositor = FrameCompositor::new(&assets, config.canvas, config.style, subtitles);

    let png = compositor.render_png(args.viseme, &args.text)?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, png).with_context(|| format!("write '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
