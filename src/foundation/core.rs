use crate::foundation::error::{LipsyncError, LipsyncResult};

/// Absolute 0-based output frame index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// File name of this frame inside a job's frame directory.
    ///
    /// Zero-padded so that lexicographic order equals frame order.
    pub fn file_name(self) -> String {
        format!("frame_{:05}.png", self.0)
    }
}

/// `ffmpeg` input pattern matching [`FrameIndex::file_name`].
pub const FRAME_FILE_PATTERN: &str = "frame_%05d.png";

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> LipsyncResult<Self> {
        if den == 0 {
            return Err(LipsyncError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(LipsyncError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Number of output frames needed to cover `secs` of audio (`ceil(secs * fps)`).
    pub fn frame_count_for(self, secs: f64) -> LipsyncResult<u64> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(LipsyncError::media(format!(
                "audio duration must be finite and > 0 (got {secs})"
            )));
        }
        Ok((secs * self.as_f64()).ceil() as u64)
    }

    /// Value for `ffmpeg -framerate`.
    pub fn ffmpeg_rate(self) -> String {
        if self.den == 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> LipsyncResult<Self> {
        if width == 0 || height == 0 {
            return Err(LipsyncError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(Self { width, height })
    }
}
