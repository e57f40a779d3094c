//! Per-frame loudness analysis.
//!
//! Analysis is an ordered chain of [`LoudnessStrategy`] implementations. The chain only moves to
//! the next strategy when the current one fails, and the last resort never fails, so a request
//! always gets a series of the requested length. Lip-sync quality degrades instead of the
//! request failing.

use std::path::Path;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::process::{CommandRunner, CommandSpec};

/// Level mapped to 0.0 loudness.
pub const DB_FLOOR: f64 = -50.0;
/// Width of the dB window mapped onto `[0, 1]` (`-10 dB` is full loudness).
pub const DB_RANGE: f64 = 40.0;
/// Sample rate audio is resampled to before either measured analysis.
pub const ANALYSIS_SAMPLE_RATE: u32 = 8_000;
/// Frame metadata key carrying the per-window RMS level.
pub const RMS_METADATA_KEY: &str = "lavfi.astats.Overall.RMS_level";
/// Empirical RMS divisor for mono s16 speech.
pub const PCM_RMS_DIVISOR: f64 = 10_000.0;
/// Band of the synthetic fallback values.
pub const SYNTHETIC_RANGE: std::ops::Range<f32> = 0.2..0.7;

/// Normalized per-frame loudness, one value in `[0, 1]` per output frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LoudnessSeries(Vec<f32>);

impl LoudnessSeries {
    /// Build a series of exactly `frame_count` values from raw measurements.
    ///
    /// Raw values are clamped to `[0, 1]` and linearly resampled when their count differs from
    /// `frame_count`.
    pub fn from_measurements(raw: &[f32], frame_count: usize) -> LipsyncResult<Self> {
        if raw.is_empty() && frame_count > 0 {
            return Err(LipsyncError::media("no loudness measurements"));
        }
        let values = resample_linear(raw, frame_count)
            .into_iter()
            .map(clamp01)
            .collect();
        Ok(Self(values))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Loudness for frame `idx`; out-of-range frames are silent.
    pub fn get(&self, idx: usize) -> f32 {
        self.0.get(idx).copied().unwrap_or(0.0)
    }
}

/// Map an RMS level in dB onto `[0, 1]`.
pub fn normalize_db(db: f64) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    ((db - DB_FLOOR) / DB_RANGE).clamp(0.0, 1.0) as f32
}

static RMS_LEVEL_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"lavfi\.astats\.Overall\.RMS_level=(\S+)")
        .unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

/// Extract the per-window `lavfi.astats.Overall.RMS_level=<x>` readings printed by `ametadata`.
///
/// The end-of-stream `RMS level dB:` summary that `astats` logs is not a window reading and is
/// ignored. `-inf` (digital silence) parses to negative infinity; unparsable readings are skipped.
pub fn parse_rms_db(log: &str) -> Vec<f64> {
    RMS_LEVEL_RE
        .captures_iter(log)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .collect()
}

/// Linearly resample `values` to exactly `target` samples.
///
/// Output index `i` reads source position `i / target * len`, blending the two bracketing
/// samples; the upper index is clamped to the last sample.
pub fn resample_linear(values: &[f32], target: usize) -> Vec<f32> {
    if values.len() == target {
        return values.to_vec();
    }
    if values.is_empty() {
        return vec![0.0; target];
    }

    let m = values.len();
    (0..target)
        .map(|i| {
            let src = (i as f64 / target as f64) * m as f64;
            let lo = (src.floor() as usize).min(m - 1);
            let hi = (lo + 1).min(m - 1);
            let frac = (src - lo as f64) as f32;
            let a = values[lo];
            let b = values[hi];
            a + (b - a) * frac
        })
        .collect()
}

/// Per-window RMS of mono s16 PCM, normalized by [`PCM_RMS_DIVISOR`].
///
/// Window `i` spans samples `i * len / frame_count .. (i + 1) * len / frame_count`, so the
/// windows tile the buffer and differ in length by at most one sample. A window is only empty
/// when there are fewer samples than frames, and empty windows are silent.
pub fn pcm_window_levels(samples: &[i16], frame_count: usize) -> Vec<f32> {
    if frame_count == 0 {
        return Vec::new();
    }
    let len = samples.len() as u64;
    let n = frame_count as u64;
    let bound = |i: u64| (i * len / n) as usize;

    (0..n)
        .map(|i| {
            let chunk = &samples[bound(i)..bound(i + 1)];
            if chunk.is_empty() {
                return 0.0;
            }
            let sum_sq: f64 = chunk.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
            let rms = (sum_sq / chunk.len() as f64).sqrt();
            (rms / PCM_RMS_DIVISOR).min(1.0) as f32
        })
        .collect()
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// What a strategy needs to know about the audio being analyzed.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisInput<'a> {
    pub audio_path: &'a Path,
    pub duration_secs: f64,
    pub frame_count: usize,
}

impl AnalysisInput<'_> {
    pub fn frame_duration_secs(&self) -> f64 {
        self.duration_secs / self.frame_count.max(1) as f64
    }
}

#[async_trait]
pub trait LoudnessStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, input: &AnalysisInput<'_>) -> LipsyncResult<LoudnessSeries>;
}

/// Windowed RMS levels from ffmpeg's `astats` filter.
///
/// The audio is resampled and cut into blocks of one output frame's worth of samples; `astats`
/// resets on every block and `ametadata` prints each block's overall RMS level to the log.
pub struct AstatsLoudness {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    timeout: Option<Duration>,
}

impl AstatsLoudness {
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

    /// Samples per analysis window at [`ANALYSIS_SAMPLE_RATE`].
    fn window_samples(input: &AnalysisInput<'_>) -> u64 {
        (f64::from(ANALYSIS_SAMPLE_RATE) * input.frame_duration_secs())
            .round()
            .max(1.0) as u64
    }

    fn command(&self, input: &AnalysisInput<'_>) -> CommandSpec {
        let filter = format!(
            "aresample={ANALYSIS_SAMPLE_RATE},asetnsamples=n={}:p=0,\
             astats=metadata=1:reset=1,ametadata=mode=print:key={RMS_METADATA_KEY}",
            Self::window_samples(input)
        );
        CommandSpec::new(&self.ffmpeg)
            .args(["-hide_banner", "-nostats", "-i"])
            .arg(input.audio_path)
            .args(["-af", &filter, "-f", "null", "-"])
            .timeout(self.timeout)
    }
}

#[async_trait]
impl LoudnessStrategy for AstatsLoudness {
    fn name(&self) -> &'static str {
        "astats"
    }

    async fn analyze(&self, input: &AnalysisInput<'_>) -> LipsyncResult<LoudnessSeries> {
        let out = self.runner.run(&self.command(input)).await?;

        // ametadata prints to the log, so the readings are on stderr.
        let stderr = String::from_utf8_lossy(&out.stderr);
        let levels: Vec<f32> = parse_rms_db(&stderr)
            .into_iter()
            .map(normalize_db)
            .collect();
        if levels.is_empty() {
            return Err(LipsyncError::media(format!(
                "astats produced no RMS readings (exit code {:?})",
                out.code
            )));
        }

        tracing::debug!(
            measurements = levels.len(),
            frames = input.frame_count,
            "parsed astats levels"
        );
        LoudnessSeries::from_measurements(&levels, input.frame_count)
    }
}

/// RMS over raw mono PCM decoded by ffmpeg.
pub struct PcmLoudness {
    runner: Arc<dyn CommandRunner>,
    ffmpeg: String,
    timeout: Option<Duration>,
}

impl PcmLoudness {
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
}

#[async_trait]
impl LoudnessStrategy for PcmLoudness {
    fn name(&self) -> &'static str {
        "pcm"
    }

    async fn analyze(&self, input: &AnalysisInput<'_>) -> LipsyncResult<LoudnessSeries> {
        let spec = CommandSpec::new(&self.ffmpeg)
            .args(["-v", "error", "-i"])
            .arg(input.audio_path)
            .args([
                "-ac",
                "1",
                "-ar",
                &ANALYSIS_SAMPLE_RATE.to_string(),
                "-f",
                "s16le",
                "-",
            ])
            .timeout(self.timeout);

        let out = self.runner.run(&spec).await?;
        if !out.success() {
            return Err(LipsyncError::media(format!(
                "ffmpeg pcm decode failed for '{}': {}",
                input.audio_path.display(),
                out.stderr_lossy()
            )));
        }

        let samples: Vec<i16> = out
            .stdout
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        if samples.is_empty() {
            return Err(LipsyncError::media("decoded pcm contains no samples"));
        }

        let levels = pcm_window_levels(&samples, input.frame_count);
        LoudnessSeries::from_measurements(&levels, input.frame_count)
    }
}

/// Plausible speech-like loudness when the audio cannot be decoded at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyntheticLoudness {
    seed: Option<u64>,
}

impl SyntheticLoudness {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn generate(&self, frame_count: usize) -> LoudnessSeries {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        LoudnessSeries(
            (0..frame_count)
                .map(|_| rng.gen_range(SYNTHETIC_RANGE))
                .collect(),
        )
    }
}

#[async_trait]
impl LoudnessStrategy for SyntheticLoudness {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn analyze(&self, input: &AnalysisInput<'_>) -> LipsyncResult<LoudnessSeries> {
        Ok(self.generate(input.frame_count))
    }
}

/// Ordered loudness strategy chain.
pub struct VolumeAnalyzer {
    strategies: Vec<Box<dyn LoudnessStrategy>>,
    last_resort: SyntheticLoudness,
}

impl VolumeAnalyzer {
    pub fn new(strategies: Vec<Box<dyn LoudnessStrategy>>) -> Self {
        Self {
            strategies,
            last_resort: SyntheticLoudness::default(),
        }
    }

    /// The standard chain: `astats` levels, then raw PCM RMS, then synthetic values.
    pub fn ffmpeg(
        runner: Arc<dyn CommandRunner>,
        ffmpeg: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self::new(vec![
            Box::new(AstatsLoudness::new(runner.clone(), ffmpeg).with_timeout(timeout)),
            Box::new(PcmLoudness::new(runner, ffmpeg).with_timeout(timeout)),
            Box::new(SyntheticLoudness::default()),
        ])
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Produce a series of exactly `input.frame_count` values. Never fails.
    #[tracing::instrument(level = "debug", skip_all, fields(frames = input.frame_count))]
    pub async fn analyze(&self, input: &AnalysisInput<'_>) -> LoudnessSeries {
        for strategy in &self.strategies {
            match strategy.analyze(input).await {
                Ok(series) if series.len() == input.frame_count => {
                    tracing::debug!(strategy = strategy.name(), "loudness analysis succeeded");
                    return series;
                }
                Ok(series) => match LoudnessSeries::from_measurements(
                    series.values(),
                    input.frame_count,
                ) {
                    Ok(resampled) => return resampled,
                    Err(err) => {
                        tracing::warn!(strategy = strategy.name(), error = %err, "loudness strategy failed");
                    }
                },
                Err(err) => {
                    tracing::warn!(strategy = strategy.name(), error = %err, "loudness strategy failed");
                }
            }
        }

        tracing::warn!("all loudness strategies failed, using synthetic levels");
        self.last_resort.generate(input.frame_count)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::process::CommandOutput;

    const ASTATS_SAMPLE: &str = "\
[Parsed_ametadata_3 @ 0x5581] frame:0    pts:0       pts_time:0
[Parsed_ametadata_3 @ 0x5581] lavfi.astats.Overall.RMS_level=-20.000000
[Parsed_ametadata_3 @ 0x5581] frame:1    pts:1000    pts_time:0.125
[Parsed_ametadata_3 @ 0x5581] lavfi.astats.Overall.RMS_level=-inf
[Parsed_ametadata_3 @ 0x5581] frame:2    pts:2000    pts_time:0.25
[Parsed_ametadata_3 @ 0x5581] lavfi.astats.Overall.RMS_level=-50.0
[Parsed_ametadata_3 @ 0x5581] frame:3    pts:3000    pts_time:0.375
[Parsed_ametadata_3 @ 0x5581] lavfi.astats.Overall.RMS_level=-5.5
[Parsed_astats_2 @ 0x5582] Channel: 1
[Parsed_astats_2 @ 0x5582] RMS level dB: -5.500000
[Parsed_astats_2 @ 0x5582] Overall
[Parsed_astats_2 @ 0x5582] RMS level dB: -5.500000
";

    /// What `astats` alone logs at end of stream: a summary, no per-window readings.
    const ASTATS_SUMMARY_ONLY: &str = "\
[Parsed_astats_0 @ 0x5581] Channel: 1
[Parsed_astats_0 @ 0x5581] RMS level dB: -20.000000
[Parsed_astats_0 @ 0x5581] Overall
[Parsed_astats_0 @ 0x5581] RMS level dB: -20.000000
";

    /// Runner that replays canned outputs in order and records what it was asked to run.
    struct ScriptedRunner {
        outputs: Mutex<Vec<LipsyncResult<CommandOutput>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn new(outputs: Vec<LipsyncResult<CommandOutput>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> LipsyncResult<CommandOutput> {
            self.calls.lock().unwrap().push(spec.args_lossy());
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.is_empty() {
                return Err(LipsyncError::media("no scripted output left"));
            }
            outputs.remove(0)
        }
    }

    fn input(path: &Path, frames: usize) -> AnalysisInput<'_> {
        AnalysisInput {
            audio_path: path,
            duration_secs: frames as f64 / 8.0,
            frame_count: frames,
        }
    }

    #[test]
    fn normalize_db_maps_speech_range() {
        assert_eq!(normalize_db(-50.0), 0.0);
        assert_eq!(normalize_db(-10.0), 1.0);
        assert!((normalize_db(-30.0) - 0.5).abs() < 1e-6);
        assert_eq!(normalize_db(-90.0), 0.0);
        assert_eq!(normalize_db(3.0), 1.0);
        assert_eq!(normalize_db(f64::NEG_INFINITY), 0.0);
        assert_eq!(normalize_db(f64::NAN), 0.0);
    }

    #[test]
    fn parse_rms_db_reads_only_window_readings() {
        let levels = parse_rms_db(ASTATS_SAMPLE);
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0], -20.0);
        assert!(levels[1].is_infinite() && levels[1] < 0.0);
        assert_eq!(levels[2], -50.0);
        assert_eq!(levels[3], -5.5);
        assert!(parse_rms_db("no readings here").is_empty());
        assert!(parse_rms_db(ASTATS_SUMMARY_ONLY).is_empty());
    }

    #[test]
    fn resample_hits_target_length_for_any_input_length() {
        let raw: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        for target in [1usize, 5, 10, 48, 97] {
            assert_eq!(resample_linear(&raw, target).len(), target);
        }
    }

    #[test]
    fn resample_of_constant_is_constant() {
        for m in [1usize, 3, 48, 200] {
            let raw = vec![0.37f32; m];
            let out = resample_linear(&raw, 48);
            assert!(out.iter().all(|&v| v == 0.37), "m={m}");
        }
    }

    #[test]
    fn resample_interpolates_between_neighbours() {
        let out = resample_linear(&[0.0, 1.0], 4);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn resample_identity_when_lengths_match() {
        let raw = vec![0.1, 0.9, 0.4];
        assert_eq!(resample_linear(&raw, 3), raw);
    }

    #[test]
    fn pcm_windows_cover_buffer() {
        let mut samples = vec![0i16; 8];
        samples.extend(std::iter::repeat_n(10_000i16, 8));
        let levels = pcm_window_levels(&samples, 2);
        assert_eq!(levels, vec![0.0, 1.0]);

        // Fewer samples than frames: the windows left without a sample are silent.
        let levels = pcm_window_levels(&[5_000, -5_000], 4);
        assert_eq!(levels, vec![0.0, 0.5, 0.0, 0.5]);

        // Remainders are spread over the windows, none is starved.
        assert_eq!(pcm_window_levels(&[20_000; 5], 2), vec![1.0, 1.0]);
        assert_eq!(pcm_window_levels(&[10_000; 5], 4), vec![1.0; 4]);
    }

    #[test]
    fn pcm_windows_of_a_long_clip_are_never_empty() {
        // 60 s at 8 kHz rendered at 30 fps.
        let samples = vec![10_000i16; 480_000];
        let levels = pcm_window_levels(&samples, 1800);
        assert_eq!(levels.len(), 1800);
        let silent: Vec<usize> = (0..levels.len()).filter(|&i| levels[i] == 0.0).collect();
        assert!(silent.is_empty(), "silent frames: {silent:?}");

        // Loud tail stays loud up to the last frame.
        let mut samples = vec![0i16; 7_999];
        samples.extend(std::iter::repeat_n(10_000i16, 7_999));
        let levels = pcm_window_levels(&samples, 48);
        assert!(levels[..24].iter().all(|&v| v == 0.0));
        assert!(levels[24..].iter().all(|&v| v == 1.0));
    }

    #[test]
    fn synthetic_values_stay_in_band_and_are_reproducible_when_seeded() {
        let a = SyntheticLoudness::seeded(7).generate(100);
        let b = SyntheticLoudness::seeded(7).generate(100);
        assert_eq!(a, b);
        assert_eq!(a.len(), 100);
        assert!(a.values().iter().all(|v| SYNTHETIC_RANGE.contains(v)));
    }

    #[tokio::test]
    async fn astats_strategy_resamples_to_frame_count() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput {
            code: Some(0),
            stderr: ASTATS_SAMPLE.as_bytes().to_vec(),
            ..Default::default()
        })]);
        let path = PathBuf::from("audio.wav");
        let strategy = AstatsLoudness::new(runner.clone(), "ffmpeg");

        let series = strategy.analyze(&input(&path, 10)).await.unwrap();
        assert_eq!(series.len(), 10);
        assert!((series.get(0) - 0.75).abs() < 1e-6);

        let calls = runner.calls.lock().unwrap();
        let filter = calls[0]
            .iter()
            .find(|a| a.contains("astats"))
            .expect("filter argument");
        assert!(filter.contains("aresample=8000"), "{filter}");
        // 8 fps at 8 kHz: one 1000-sample window per frame.
        assert!(filter.contains("asetnsamples=n=1000:p=0"), "{filter}");
        assert!(filter.contains("astats=metadata=1:reset=1"), "{filter}");
        assert!(filter.contains("ametadata=mode=print:key=lavfi.astats.Overall.RMS_level"));
    }

    #[tokio::test]
    async fn astats_readings_follow_the_audio_envelope() {
        // Four quiet windows then four loud ones.
        let log: String = [f64::NEG_INFINITY, -60.0, -55.0, -50.0, -20.0, -15.0, -12.0, -10.0]
            .iter()
            .enumerate()
            .map(|(i, db)| {
                format!("frame:{i} pts:{} pts_time:0\n{RMS_METADATA_KEY}={db}\n", i * 1000)
            })
            .collect();
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput {
            code: Some(0),
            stderr: log.into_bytes(),
            ..Default::default()
        })]);
        let path = PathBuf::from("audio.wav");

        let series = AstatsLoudness::new(runner, "ffmpeg")
            .analyze(&input(&path, 8))
            .await
            .unwrap();
        assert!(series.values()[..4].iter().all(|&v| v == 0.0), "{series:?}");
        assert!(series.values()[4..].iter().all(|&v| v >= 0.75), "{series:?}");
    }

    #[tokio::test]
    async fn summary_only_log_falls_through_to_pcm() {
        let mut pcm: Vec<u8> = std::iter::repeat_n(0i16, 20)
            .flat_map(|s| s.to_le_bytes())
            .collect();
        pcm.extend(std::iter::repeat_n(10_000i16, 20).flat_map(|s| s.to_le_bytes()));
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput {
                code: Some(0),
                stderr: ASTATS_SUMMARY_ONLY.as_bytes().to_vec(),
                ..Default::default()
            }),
            Ok(CommandOutput {
                code: Some(0),
                stdout: pcm,
                ..Default::default()
            }),
        ]);
        let analyzer = VolumeAnalyzer::ffmpeg(runner.clone(), "ffmpeg", None);
        let path = PathBuf::from("audio.wav");

        let series = analyzer.analyze(&input(&path, 4)).await;
        assert_eq!(series.values(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn chain_falls_back_to_pcm_when_astats_is_silent() {
        let pcm: Vec<u8> = std::iter::repeat_n(10_000i16, 40)
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput {
                code: Some(0),
                stderr: b"no stats".to_vec(),
                ..Default::default()
            }),
            Ok(CommandOutput {
                code: Some(0),
                stdout: pcm,
                ..Default::default()
            }),
        ]);
        let analyzer = VolumeAnalyzer::ffmpeg(runner.clone(), "ffmpeg", None);
        let path = PathBuf::from("audio.mp3");

        let series = analyzer.analyze(&input(&path, 4)).await;
        assert_eq!(series.values(), &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(runner.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn chain_reaches_synthetic_when_ffmpeg_is_missing() {
        let runner = ScriptedRunner::new(vec![
            Err(LipsyncError::media("failed to spawn ffmpeg")),
            Err(LipsyncError::media("failed to spawn ffmpeg")),
        ]);
        let analyzer = VolumeAnalyzer::ffmpeg(runner, "ffmpeg", None);
        assert_eq!(analyzer.strategy_names(), vec!["astats", "pcm", "synthetic"]);
        let path = PathBuf::from("audio.mp3");

        let series = analyzer.analyze(&input(&path, 33)).await;
        assert_eq!(series.len(), 33);
        assert!(series.values().iter().all(|v| SYNTHETIC_RANGE.contains(v)));
    }

    #[tokio::test]
    async fn empty_chain_still_produces_a_series() {
        let analyzer = VolumeAnalyzer::new(Vec::new());
        let path = PathBuf::from("audio.mp3");
        assert_eq!(analyzer.analyze(&input(&path, 5)).await.len(), 5);
    }
}
