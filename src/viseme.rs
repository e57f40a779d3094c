//! Loudness to mouth-pose mapping.

use std::fmt;
use std::str::FromStr;

use crate::foundation::error::LipsyncError;

/// Mouth pose shown for one frame, ordered from closed to most open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Viseme {
    Closed,
    Small,
    Medium,
    O,
}

impl Viseme {
    pub const COUNT: usize = 4;

    /// Every pose the mapper can emit; each needs a sprite.
    pub const ALL: [Viseme; Self::COUNT] =
        [Viseme::Closed, Viseme::Small, Viseme::Medium, Viseme::O];

    /// Upper bounds (exclusive) of `Closed`, `Small` and `Medium`.
    pub const THRESHOLDS: [f32; 3] = [0.2, 0.45, 0.7];

    pub fn from_loudness(loudness: f32) -> Self {
        let [closed, small, medium] = Self::THRESHOLDS;
        if loudness.is_nan() || loudness < closed {
            Viseme::Closed
        } else if loudness < small {
            Viseme::Small
        } else if loudness < medium {
            Viseme::Medium
        } else {
            Viseme::O
        }
    }

    /// 0 for closed, increasing with how far the mouth is open.
    pub fn openness(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Viseme::Closed => "closed",
            Viseme::Small => "small",
            Viseme::Medium => "medium",
            Viseme::O => "o",
        }
    }

    pub fn sprite_file(self) -> &'static str {
        match self {
            Viseme::Closed => "mouth-closed.png",
            Viseme::Small => "mouth-open-small.png",
            Viseme::Medium => "mouth-open-medium.png",
            Viseme::O => "mouth-o.png",
        }
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Viseme {
    type Err = LipsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Viseme::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LipsyncError::validation(format!("unknown viseme '{s}'")))
    }
}
