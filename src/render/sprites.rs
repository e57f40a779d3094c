use std::path::Path;

use anyhow::Context as _;
use image::RgbaImage;

use crate::foundation::error::{LipsyncError, LipsyncResult};
use crate::viseme::Viseme;

/// Base character sprite file inside the asset directory.
pub const CHARACTER_FILE: &str = "character.png";

/// Character sprite plus one mouth sprite per [`Viseme`], decoded to straight-alpha RGBA8.
///
/// Read-only once loaded; the compositor only ever reads from it.
#[derive(Clone, Debug)]
pub struct CharacterAssets {
    character: RgbaImage,
    mouths: [RgbaImage; Viseme::COUNT],
}

impl CharacterAssets {
    pub fn from_images(character: RgbaImage, mouths: [RgbaImage; Viseme::COUNT]) -> Self {
        Self { character, mouths }
    }

    /// Load `character.png` and every mouth sprite from `dir`.
    pub fn load_dir(dir: &Path) -> LipsyncResult<Self> {
        let character = load_sprite(&dir.join(CHARACTER_FILE))?;
        let mut mouths = Vec::with_capacity(Viseme::COUNT);
        for viseme in Viseme::ALL {
            mouths.push(load_sprite(&dir.join(viseme.sprite_file()))?);
        }
        let mouths: [RgbaImage; Viseme::COUNT] = mouths
            .try_into()
            .map_err(|_| LipsyncError::render("mouth sprite count mismatch"))?;

        tracing::debug!(dir = %dir.display(), "loaded character sprites");
        Ok(Self { character, mouths })
    }

    pub fn character(&self) -> &RgbaImage {
        &self.character
    }

    pub fn mouth(&self, viseme: Viseme) -> &RgbaImage {
        &self.mouths[viseme as usize]
    }
}

pub fn decode_sprite(bytes: &[u8]) -> LipsyncResult<RgbaImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode sprite image")?;
    let rgba = dyn_img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(LipsyncError::render("sprite has zero width or height"));
    }
    Ok(rgba)
}

fn load_sprite(path: &Path) -> LipsyncResult<RgbaImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read sprite '{}'", path.display()))?;
    decode_sprite(&bytes).map_err(|e| {
        LipsyncError::render(format!("invalid sprite '{}': {e}", path.display()))
    })
}
