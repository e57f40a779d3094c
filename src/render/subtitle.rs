//! Burned-in subtitle overlay.
//!
//! The subtitle is described as a small SVG (rounded backdrop + centered text) and rasterized
//! with resvg, then composited over the frame like any other sprite.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use image::RgbaImage;

use crate::foundation::error::{LipsyncError, LipsyncResult};

pub const MAX_CHARS_PER_LINE: usize = 40;
pub const MAX_LINES: usize = 2;
/// Height of the overlay strip in pixels.
pub const SUBTITLE_HEIGHT: u32 = 120;
/// Gap between the overlay strip and the bottom edge of the canvas.
pub const SUBTITLE_BOTTOM_MARGIN: u32 = 50;
pub const FONT_SIZE_PX: u32 = 32;
const LINE_HEIGHT_PX: u32 = 38;
const BACKDROP_INSET_PX: u32 = 40;

/// Greedily pack whole words into at most `MAX_LINES` lines of `max_chars`.
///
/// Words that do not fit in the available lines are dropped without an ellipsis. Text that
/// already fits on one line is returned as-is. A single word longer than `max_chars` gets a
/// line of its own rather than being split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if candidate_len <= max_chars || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            continue;
        }

        lines.push(std::mem::take(&mut current));
        if lines.len() == MAX_LINES {
            return lines;
        }
        current.push_str(word);
    }
    if !current.is_empty() && lines.len() < MAX_LINES {
        lines.push(current);
    }
    lines
}

/// Escape the characters that are significant in XML text and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// SVG document for a `width` x [`SUBTITLE_HEIGHT`] subtitle strip.
pub fn subtitle_svg(lines: &[String], width: u32) -> String {
    let center_x = width / 2;
    let backdrop_w = width.saturating_sub(2 * BACKDROP_INSET_PX);
    let n = lines.len().max(1) as u32;
    // Baseline of the first line so that the block is vertically centered.
    let first_baseline =
        (SUBTITLE_HEIGHT / 2 + FONT_SIZE_PX / 3) as i64 - ((n - 1) * LINE_HEIGHT_PX / 2) as i64;

    let mut spans = String::new();
    for (i, line) in lines.iter().enumerate() {
        let dy = if i == 0 { 0 } else { LINE_HEIGHT_PX };
        spans.push_str(&format!(
            r#"<tspan x="{center_x}" dy="{dy}">{}</tspan>"#,
            escape_xml(line)
        ));
    }

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{SUBTITLE_HEIGHT}"><rect x="{BACKDROP_INSET_PX}" y="0" width="{backdrop_w}" height="{SUBTITLE_HEIGHT}" rx="10" fill="black" fill-opacity="0.8"/><text x="{center_x}" y="{first_baseline}" font-family="Arial, sans-serif" font-size="{FONT_SIZE_PX}" font-weight="bold" fill="white" text-anchor="middle">{spans}</text></svg>"#
    )
}

/// Font database shared by every subtitle render: system fonts plus any fonts shipped in
/// `extra_dir` (and its `fonts/` subdirectory).
pub fn build_fontdb(extra_dir: Option<&Path>) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    if let Some(dir) = extra_dir {
        load_fonts_from_dir(&mut db, dir);
        load_fonts_from_dir(&mut db, &dir.join("fonts"));
    }

    tracing::debug!(faces = db.len(), "subtitle font database ready");
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" && ext != "ttc" {
            continue;
        }
        if let Err(e) = db.load_font_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable font");
        }
    }
}

/// Rasterizes subtitle strips.
#[derive(Clone)]
pub struct SubtitleRenderer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SubtitleRenderer {
    pub fn new(fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self { fontdb }
    }

    /// Render the wrapped `text` as a straight-alpha strip `width` pixels wide.
    ///
    /// Returns `None` when there is nothing to show.
    pub fn render(&self, text: &str, width: u32) -> LipsyncResult<Option<RgbaImage>> {
        let lines = wrap_text(text, MAX_CHARS_PER_LINE);
        if lines.is_empty() || width == 0 {
            return Ok(None);
        }

        let svg = subtitle_svg(&lines, width);
        let opts = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts).context("parse subtitle svg")?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, SUBTITLE_HEIGHT)
            .ok_or_else(|| LipsyncError::render("failed to allocate subtitle pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );

        let mut rgba = pixmap.take();
        demultiply_rgba8_in_place(&mut rgba);
        let img = RgbaImage::from_raw(width, SUBTITLE_HEIGHT, rgba)
            .ok_or_else(|| LipsyncError::render("subtitle pixmap size mismatch"))?;
        Ok(Some(img))
    }
}

impl std::fmt::Debug for SubtitleRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitleRenderer")
            .field("font_faces", &self.fontdb.len())
            .finish()
    }
}

fn demultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
