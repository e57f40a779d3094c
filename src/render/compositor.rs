use std::io::Cursor;

use anyhow::Context as _;
use image::{Rgba, RgbaImage, imageops};

use crate::foundation::core::Canvas;
use crate::foundation::error::LipsyncResult;
use crate::render::sprites::CharacterAssets;
use crate::render::subtitle::{SUBTITLE_BOTTOM_MARGIN, SUBTITLE_HEIGHT, SubtitleRenderer};
use crate::viseme::Viseme;

/// Character side length as a fraction of canvas height.
pub const CHARACTER_SCALE: f64 = 0.6;
/// Character top edge as a fraction of canvas height.
pub const CHARACTER_TOP: f64 = 0.1;
pub const MOUTH_WIDTH_SCALE: f64 = 0.25;
pub const MOUTH_HEIGHT_SCALE: f64 = 0.2;
/// Mouth center, measured down from the character's top edge, as a fraction of its size.
pub const MOUTH_ANCHOR_Y: f64 = 0.52;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStyle {
    /// Opaque canvas color (zinc-900 by default).
    pub background: [u8; 4],
    pub subtitles: bool,
}

impl Default for FrameStyle {
    fn default() -> Self {
        Self {
            background: [24, 24, 27, 255],
            subtitles: true,
        }
    }
}

/// Pixel geometry of one frame, top-left origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    pub character_size: u32,
    pub character_x: i64,
    pub character_y: i64,
    pub mouth_width: u32,
    pub mouth_height: u32,
    pub mouth_x: i64,
    pub mouth_y: i64,
    pub subtitle_y: i64,
}

impl FrameLayout {
    pub fn for_canvas(canvas: Canvas) -> Self {
        let w = i64::from(canvas.width);
        let h = i64::from(canvas.height);

        let character_size = floor_frac(canvas.height, CHARACTER_SCALE).max(1);
        let size = i64::from(character_size);
        let character_x = (w - size).div_euclid(2);
        let character_y = i64::from(floor_frac(canvas.height, CHARACTER_TOP));

        let mouth_width = floor_frac(character_size, MOUTH_WIDTH_SCALE).max(1);
        let mouth_height = floor_frac(character_size, MOUTH_HEIGHT_SCALE).max(1);
        let mouth_x = character_x + (size - i64::from(mouth_width)).div_euclid(2);
        let mouth_y = character_y + i64::from(floor_frac(character_size, MOUTH_ANCHOR_Y))
            - i64::from(mouth_height / 2);

        let subtitle_y = h - i64::from(SUBTITLE_HEIGHT) - i64::from(SUBTITLE_BOTTOM_MARGIN);

        Self {
            character_size,
            character_x,
            character_y,
            mouth_width,
            mouth_height,
            mouth_x,
            mouth_y,
            subtitle_y,
        }
    }
}

fn floor_frac(v: u32, frac: f64) -> u32 {
    (f64::from(v) * frac).floor() as u32
}

/// Scale `src` to fit inside `width` x `height` preserving aspect ratio, centered on a
/// transparent canvas of exactly that size.
pub fn fit_contain(src: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    let mut out = RgbaImage::new(width, height);
    if sw == 0 || sh == 0 || width == 0 || height == 0 {
        return out;
    }

    let scale = (f64::from(width) / f64::from(sw)).min(f64::from(height) / f64::from(sh));
    let nw = ((f64::from(sw) * scale).round() as u32).clamp(1, width);
    let nh = ((f64::from(sh) * scale).round() as u32).clamp(1, height);

    let resized = if (nw, nh) == (sw, sh) {
        src.clone()
    } else {
        imageops::resize(src, nw, nh, imageops::FilterType::Lanczos3)
    };
    let x = i64::from((width - nw) / 2);
    let y = i64::from((height - nh) / 2);
    imageops::replace(&mut out, &resized, x, y);
    out
}

/// Renders talking-character frames.
///
/// Sprites are scaled once at construction; the shared [`CharacterAssets`] are only read.
/// Output depends only on (viseme, text), so equal inputs give byte-identical frames.
#[derive(Clone, Debug)]
pub struct FrameCompositor {
    canvas: Canvas,
    style: FrameStyle,
    layout: FrameLayout,
    character: RgbaImage,
    mouths: Vec<RgbaImage>,
    subtitles: SubtitleRenderer,
}

impl FrameCompositor {
    pub fn new(
        assets: &CharacterAssets,
        canvas: Canvas,
        style: FrameStyle,
        subtitles: SubtitleRenderer,
    ) -> Self {
        let layout = FrameLayout::for_canvas(canvas);
        let character = fit_contain(
            assets.character(),
            layout.character_size,
            layout.character_size,
        );
        let mouths = Viseme::ALL
            .iter()
            .map(|&v| fit_contain(assets.mouth(v), layout.mouth_width, layout.mouth_height))
            .collect();

        Self {
            canvas,
            style,
            layout,
            character,
            mouths,
            subtitles,
        }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Subtitle strip for `text`, or `None` when subtitles are disabled or `text` is blank.
    pub fn subtitle_overlay(&self, text: &str) -> LipsyncResult<Option<RgbaImage>> {
        if !self.style.subtitles {
            return Ok(None);
        }
        self.subtitles.render(text, self.canvas.width)
    }

    /// Composite background, character, mouth and an optional prepared subtitle strip.
    pub fn compose(&self, viseme: Viseme, subtitle: Option<&RgbaImage>) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(
            self.canvas.width,
            self.canvas.height,
            Rgba(self.style.background),
        );
        let l = self.layout;
        imageops::overlay(&mut frame, &self.character, l.character_x, l.character_y);
        imageops::overlay(
            &mut frame,
            &self.mouths[viseme as usize],
            l.mouth_x,
            l.mouth_y,
        );
        if let Some(strip) = subtitle {
            imageops::overlay(&mut frame, strip, 0, l.subtitle_y);
        }
        frame
    }

    pub fn render_frame(&self, viseme: Viseme, text: &str) -> LipsyncResult<RgbaImage> {
        let subtitle = self.subtitle_overlay(text)?;
        Ok(self.compose(viseme, subtitle.as_ref()))
    }

    pub fn render_png(&self, viseme: Viseme, text: &str) -> LipsyncResult<Vec<u8>> {
        encode_png(&self.render_frame(viseme, text)?)
    }
}

/// Encode an opaque frame as an RGB PNG.
pub fn encode_png(frame: &RgbaImage) -> LipsyncResult<Vec<u8>> {
    let rgb = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .context("encode frame png")?;
    Ok(buf)
}
