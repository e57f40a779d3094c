//! Frame rendering: sprite loading, subtitle overlay and per-frame compositing.

pub mod compositor;
pub mod sprites;
pub mod subtitle;

pub use compositor::{FrameCompositor, FrameLayout, FrameStyle, encode_png, fit_contain};
pub use sprites::{CHARACTER_FILE, CharacterAssets};
pub use subtitle::{SubtitleRenderer, build_fontdb, wrap_text};
