//! Binary asset loading for the compositor: raster images decoded into
//! premultiplied pixmaps, and the font used by the text layer. Everything is
//! cached by path; a frame never blocks on decoding the same file twice.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fontdue::Font;
use tiny_skia::{IntSize, Pixmap};
use tracing::warn;

use crate::{OverlayError, Result};

/// Common system font locations tried when no font is configured.
const FALLBACK_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
];

enum CacheEntry<T> {
    Loaded(T),
    Failed,
}

/// Caches decoded images and fonts keyed by path. Load failures are cached
/// too, so a missing file is warned about once rather than every frame, and
/// the affected layer is skipped until the path changes.
#[derive(Default)]
pub struct AssetCache {
    images: HashMap<PathBuf, CacheEntry<Arc<Pixmap>>>,
    fonts: HashMap<PathBuf, CacheEntry<Arc<Font>>>,
    fallback_font: Option<CacheEntry<Arc<Font>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded, premultiplied pixmap for the image at `path`, or `None` when
    /// the file is missing or undecodable.
    pub fn image(&mut self, path: &Path) -> Option<Arc<Pixmap>> {
        if !self.images.contains_key(path) {
            let entry = match load_image(path) {
                Ok(pixmap) => CacheEntry::Loaded(Arc::new(pixmap)),
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to load image, skipping layer");
                    CacheEntry::Failed
                }
            };
            self.images.insert(path.to_path_buf(), entry);
        }
        match self.images.get(path) {
            Some(CacheEntry::Loaded(pixmap)) => Some(Arc::clone(pixmap)),
            _ => None,
        }
    }

    /// Font for the text layer. A configured path wins; otherwise the first
    /// loadable fallback font is used. `None` means the text layer is skipped.
    pub fn font(&mut self, configured: Option<&Path>) -> Option<Arc<Font>> {
        if let Some(path) = configured {
            if !self.fonts.contains_key(path) {
                let entry = match load_font(path) {
                    Ok(font) => CacheEntry::Loaded(Arc::new(font)),
                    Err(err) => {
                        warn!(path = %path.display(), %err, "failed to load font, skipping text");
                        CacheEntry::Failed
                    }
                };
                self.fonts.insert(path.to_path_buf(), entry);
            }
            return match self.fonts.get(path) {
                Some(CacheEntry::Loaded(font)) => Some(Arc::clone(font)),
                _ => None,
            };
        }

        if self.fallback_font.is_none() {
            let loaded = FALLBACK_FONTS
                .iter()
                .find_map(|candidate| load_font(Path::new(candidate)).ok());
            self.fallback_font = Some(match loaded {
                Some(font) => CacheEntry::Loaded(Arc::new(font)),
                None => {
                    warn!("no usable system font found, text layer disabled");
                    CacheEntry::Failed
                }
            });
        }
        match self.fallback_font.as_ref() {
            Some(CacheEntry::Loaded(font)) => Some(Arc::clone(font)),
            _ => None,
        }
    }

    /// Drops every cached entry, forcing a reload on next use.
    pub fn clear(&mut self) {
        self.images.clear();
        self.fonts.clear();
        self.fallback_font = None;
    }
}

fn load_image(path: &Path) -> Result<Pixmap> {
    let decoded = image::open(path)
        .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    let size = IntSize::from_wh(width, height)
        .ok_or(OverlayError::InvalidInput("image has zero dimensions"))?;

    // tiny-skia stores premultiplied RGBA.
    let mut data = decoded.into_raw();
    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3] as u16;
        pixel[0] = ((pixel[0] as u16 * alpha) / 255) as u8;
        pixel[1] = ((pixel[1] as u16 * alpha) / 255) as u8;
        pixel[2] = ((pixel[2] as u16 * alpha) / 255) as u8;
    }
    Pixmap::from_vec(data, size).ok_or(OverlayError::InvalidInput("image too large for canvas"))
}

fn load_font(path: &Path) -> Result<Font> {
    let bytes = std::fs::read(path)?;
    Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|err| OverlayError::DecodeFailure(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_image_is_skipped_and_cached() {
        let mut cache = AssetCache::new();
        let path = Path::new("/nonexistent/image.png");
        assert!(cache.image(path).is_none());
        // Second lookup hits the cached failure.
        assert!(cache.image(path).is_none());
    }

    #[test]
    fn decodes_png_images() {
        let dir = std::env::temp_dir().join("audiogram-asset-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("red.png");

        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill(tiny_skia::Color::from_rgba8(255, 0, 0, 255));
        pixmap.save_png(&path).unwrap();

        let mut cache = AssetCache::new();
        let loaded = cache.image(&path).expect("png should decode");
        assert_eq!(loaded.width(), 4);
        assert_eq!(loaded.height(), 4);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_configured_font_is_skipped() {
        let mut cache = AssetCache::new();
        assert!(cache.font(Some(Path::new("/nonexistent/font.ttf"))).is_none());
    }
}
