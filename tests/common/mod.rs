#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};

use lipsync::render::CHARACTER_FILE;
use lipsync::{
    CharacterAssets, CommandOutput, CommandRunner, CommandSpec, LipsyncResult, PipelineConfig,
    SpeechSynthesizer, SubtitleRenderer, SynthesizedAudio, VideoPipeline, Viseme,
};

pub fn test_sprites() -> CharacterAssets {
    let character = RgbaImage::from_pixel(40, 40, Rgba([220, 40, 40, 255]));
    let mouths = Viseme::ALL.map(|v| RgbaImage::from_pixel(12, 8, Rgba([0, 60 * v as u8, 255, 255])));
    CharacterAssets::from_images(character, mouths)
}

/// Write `character.png` and every mouth sprite into `dir`.
pub fn write_sprite_dir(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    RgbaImage::from_pixel(40, 40, Rgba([220, 40, 40, 255]))
        .save(dir.join(CHARACTER_FILE))
        .unwrap();
    for v in Viseme::ALL {
        RgbaImage::from_pixel(12, 8, Rgba([0, 60 * v as u8, 255, 255]))
            .save(dir.join(v.sprite_file()))
            .unwrap();
    }
}

/// Stands in for ffprobe/ffmpeg: reports a fixed duration, canned per-window astats readings, and "encodes"
/// by counting the frames on disk and writing a placeholder file.
pub struct FakeMedia {
    pub duration_secs: f64,
    pub encoder_exit: i32,
    pub programs: Mutex<Vec<String>>,
    pub frames_at_encode: Mutex<Option<usize>>,
}

impl FakeMedia {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            encoder_exit: 0,
            programs: Mutex::new(Vec::new()),
            frames_at_encode: Mutex::new(None),
        }
    }

    pub fn failing_encoder(duration_secs: f64) -> Self {
        Self {
            encoder_exit: 1,
            ..Self::new(duration_secs)
        }
    }

    pub fn calls(&self) -> usize {
        self.programs.lock().unwrap().len()
    }

    pub fn encode_calls(&self) -> usize {
        self.frames_at_encode.lock().unwrap().iter().count()
    }
}

#[async_trait]
impl CommandRunner for FakeMedia {
    async fn run(&self, spec: &CommandSpec) -> LipsyncResult<CommandOutput> {
        self.programs.lock().unwrap().push(spec.program.clone());
        let args = spec.args_lossy();

        if spec.program == "ffprobe" {
            return Ok(CommandOutput {
                code: Some(0),
                stdout: format!(r#"{{"format": {{"duration": "{:.6}"}}}}"#, self.duration_secs)
                    .into_bytes(),
                stderr: Vec::new(),
            });
        }

        if args.iter().any(|a| a == "-af") {
            let log: String = [-60.0, -30.0, -18.0, -8.0, -25.0, -45.0]
                .iter()
                .enumerate()
                .map(|(i, db)| {
                    format!(
                        "[Parsed_ametadata_3 @ 0x1] frame:{i}\n\
                         [Parsed_ametadata_3 @ 0x1] lavfi.astats.Overall.RMS_level={db:.6}\n"
                    )
                })
                .collect();
            return Ok(CommandOutput {
                code: Some(0),
                stdout: Vec::new(),
                stderr: log.into_bytes(),
            });
        }

        if args.iter().any(|a| a == "-c:v") {
            let pattern = args
                .iter()
                .find(|a| a.ends_with("frame_%05d.png"))
                .expect("frame pattern argument");
            let frames_dir = Path::new(pattern).parent().unwrap();
            let frames = std::fs::read_dir(frames_dir).unwrap().count();
            *self.frames_at_encode.lock().unwrap() = Some(frames);

            if self.encoder_exit != 0 {
                return Ok(CommandOutput {
                    code: Some(self.encoder_exit),
                    stdout: Vec::new(),
                    stderr: b"Conversion failed!".to_vec(),
                });
            }
            let out = args.last().unwrap();
            std::fs::write(out, b"\x00\x00\x00\x18ftypmp42fake").unwrap();
            return Ok(CommandOutput {
                code: Some(0),
                ..CommandOutput::default()
            });
        }

        Ok(CommandOutput {
            code: Some(1),
            stdout: Vec::new(),
            stderr: b"unexpected invocation".to_vec(),
        })
    }
}

pub fn test_pipeline(runner: Arc<dyn CommandRunner>, config: PipelineConfig) -> VideoPipeline {
    VideoPipeline::new(
        runner,
        &test_sprites(),
        SubtitleRenderer::new(Arc::new(usvg::fontdb::Database::new())),
        config,
    )
    .unwrap()
}

/// Synthesizer returning a fixed payload and counting calls.
pub struct FakeSynth {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeSynth {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynth {
    fn provider(&self) -> &'static str {
        "fake"
    }

    async fn synthesize(&self, _text: &str) -> LipsyncResult<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(lipsync::LipsyncError::synthesis("provider down"));
        }
        Ok(SynthesizedAudio::new(b"RIFF\x24\x00\x00\x00WAVEfake".to_vec(), "audio/wav"))
    }
}

pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
