//! Video encoding.

/// `ffmpeg`-based MP4 muxing of a PNG frame sequence with the speech track.
pub mod ffmpeg;

pub use ffmpeg::{EncodeJob, VideoEncoder};
