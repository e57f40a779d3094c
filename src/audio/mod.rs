//! Speech audio: the asset handed to the pipeline, duration probing and loudness analysis.

pub mod analyze;
pub mod probe;

pub use analyze::{
    AnalysisInput, AstatsLoudness, LoudnessSeries, LoudnessStrategy, PcmLoudness,
    SyntheticLoudness, VolumeAnalyzer,
};
pub use probe::probe_duration;

/// Encoded speech audio for one request.
#[derive(Clone, Debug)]
pub struct AudioAsset {
    pub bytes: Vec<u8>,
    /// MIME type when known (e.g. from the TTS provider).
    pub content_type: Option<String>,
}

impl AudioAsset {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// File extension used when the asset is written to disk.
    ///
    /// ffmpeg sniffs the container itself; the extension only has to be plausible.
    pub fn file_extension(&self) -> &'static str {
        match self.content_type.as_deref() {
            Some("audio/wav" | "audio/x-wav" | "audio/wave") => "wav",
            Some("audio/mpeg" | "audio/mp3") => "mp3",
            Some("audio/ogg") => "ogg",
            _ if self.bytes.starts_with(b"RIFF") => "wav",
            _ if self.bytes.starts_with(b"OggS") => "ogg",
            _ => "mp3",
        }
    }
}
