//! Frame compositor: paints the five fixed layers (background, photo,
//! visualization, logo, text) onto the offscreen canvas in z-order. The
//! canvas has a fixed 1920x1080 geometry; all layout is derived from it and
//! the settings each frame, so a settings change is visible on the next tick.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use fontdue::Font;
use tiny_skia::{FillRule, Mask, Pixmap, PixmapPaint, Transform};

use crate::assets::AssetCache;
use crate::config::{HorizontalAnchor, LogoAnchor, Settings, VerticalAnchor};
use crate::smoothing::{AudioFrame, DEFAULT_FREQUENCY_LEN, DEFAULT_TIME_DOMAIN_LEN};
use crate::styles::{self, VisualConfig};
use crate::{OverlayError, Result};

pub const CANVAS_WIDTH: u32 = 1920;
pub const CANVAS_HEIGHT: u32 = 1080;

/// Shared read handle onto the compositor's canvas. The export pipeline pulls
/// straight-alpha RGBA bytes from here while the render loop keeps painting.
#[derive(Clone)]
pub struct CanvasHandle {
    shared: Arc<Mutex<Pixmap>>,
}

impl CanvasHandle {
    pub fn width(&self) -> u32 {
        CANVAS_WIDTH
    }

    pub fn height(&self) -> u32 {
        CANVAS_HEIGHT
    }

    /// Copies the current frame as straight-alpha RGBA bytes.
    pub fn copy_rgba(&self) -> Result<Vec<u8>> {
        let pixmap = self
            .shared
            .lock()
            .map_err(|_| OverlayError::InvalidInput("canvas lock poisoned"))?;
        let mut out = Vec::with_capacity(pixmap.pixels().len() * 4);
        for pixel in pixmap.pixels() {
            let demultiplied = pixel.demultiply();
            out.extend_from_slice(&[
                demultiplied.red(),
                demultiplied.green(),
                demultiplied.blue(),
                demultiplied.alpha(),
            ]);
        }
        Ok(out)
    }
}

/// Paints complete frames from settings plus one stabilized audio frame.
pub struct FrameCompositor {
    canvas: Arc<Mutex<Pixmap>>,
    assets: AssetCache,
}

impl FrameCompositor {
    pub fn new() -> Result<Self> {
        let pixmap = Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)
            .ok_or(OverlayError::InvalidInput("canvas allocation failed"))?;
        Ok(Self {
            canvas: Arc::new(Mutex::new(pixmap)),
            assets: AssetCache::new(),
        })
    }

    pub fn handle(&self) -> CanvasHandle {
        CanvasHandle {
            shared: Arc::clone(&self.canvas),
        }
    }

    /// Paints one frame. When `playing` is false the visualization layer uses
    /// the synthetic idle animation instead of `frame`.
    pub fn render_frame(
        &mut self,
        settings: &Settings,
        frame: &AudioFrame,
        playing: bool,
        seconds: f64,
    ) -> Result<()> {
        let mut pixmap = self
            .canvas
            .lock()
            .map_err(|_| OverlayError::InvalidInput("canvas lock poisoned"))?;
        let width = CANVAS_WIDTH as f32;
        let height = CANVAS_HEIGHT as f32;

        // Layer 1: background.
        if settings.background.transparent {
            pixmap.fill(tiny_skia::Color::TRANSPARENT);
        } else {
            pixmap.fill(styles::rgba(settings.background.color, 1.0));
            if let Some(path) = settings.background.image.as_deref() {
                if let Some(image) = self.assets.image(path) {
                    draw_cover_image(&mut pixmap, &image, width, height);
                }
            }
        }

        // Layer 2: photo, optionally clipped to a circle with a thin ring.
        if let Some(path) = settings.photo.image.as_deref() {
            if let Some(image) = self.assets.image(path) {
                draw_photo(&mut pixmap, &image, settings, width, height);
            }
        }

        // Layer 3: visualization.
        let idle;
        let visual_frame = if playing {
            frame
        } else {
            idle = idle_frame(seconds);
            &idle
        };
        let visualizer = &settings.visualizer;
        let config = VisualConfig {
            center_x: width / 2.0,
            center_y: match visualizer.position {
                VerticalAnchor::Top => height * 0.25,
                VerticalAnchor::Center => height * 0.5,
                VerticalAnchor::Bottom => height * 0.75,
            },
            width: width * 0.8,
            height: height * 0.3,
            color: visualizer.color,
            secondary_color: visualizer.secondary_color,
            size: visualizer.size / 100.0,
        };
        styles::draw(visualizer.style, &mut pixmap, visual_frame, &config, seconds);

        // Layer 4: logo.
        if let Some(path) = settings.logo.image.as_deref() {
            if let Some(image) = self.assets.image(path) {
                draw_logo(&mut pixmap, &image, settings, width, height);
            }
        }

        // Layer 5: text. Skipped entirely when no usable font exists.
        if !settings.text.title.is_empty() || !settings.text.subtitle.is_empty() {
            if let Some(font) = self.assets.font(settings.text.font.as_deref()) {
                draw_text_block(&mut pixmap, &font, settings, width, height);
            }
        }

        Ok(())
    }

    /// Renders one frame and writes it to `path` as PNG.
    pub fn render_to_png(
        &mut self,
        settings: &Settings,
        frame: &AudioFrame,
        playing: bool,
        seconds: f64,
        path: &Path,
    ) -> Result<()> {
        self.render_frame(settings, frame, playing, seconds)?;
        let pixmap = self
            .canvas
            .lock()
            .map_err(|_| OverlayError::InvalidInput("canvas lock poisoned"))?;
        pixmap
            .save_png(path)
            .map_err(|err| OverlayError::EncodeFailure(err.to_string()))
    }
}

/// Synthetic gentle animation shown while no audio is playing.
pub fn idle_frame(seconds: f64) -> AudioFrame {
    let t = seconds as f32;
    let frequency: Vec<u8> = (0..DEFAULT_FREQUENCY_LEN)
        .map(|i| ((i as f32 * 0.1 + t).sin() * 30.0 + 40.0).clamp(0.0, 255.0) as u8)
        .collect();
    let time_domain: Vec<u8> = (0..DEFAULT_TIME_DOMAIN_LEN)
        .map(|i| (128.0 + (i as f32 * 0.05 + t).sin() * 20.0).clamp(0.0, 255.0) as u8)
        .collect();
    AudioFrame {
        frequency,
        time_domain,
        average_amplitude: 0.2,
    }
}

fn draw_cover_image(pixmap: &mut Pixmap, image: &Pixmap, width: f32, height: f32) {
    let scale = (width / image.width() as f32).max(height / image.height() as f32);
    let tx = (width - image.width() as f32 * scale) / 2.0;
    let ty = (height - image.height() as f32 * scale) / 2.0;
    pixmap.draw_pixmap(
        0,
        0,
        image.as_ref(),
        &PixmapPaint::default(),
        Transform::from_row(scale, 0.0, 0.0, scale, tx, ty),
        None,
    );
}

fn draw_photo(pixmap: &mut Pixmap, image: &Pixmap, settings: &Settings, width: f32, height: f32) {
    let photo = &settings.photo;
    let radius = photo.size;
    let cx = match photo.position {
        HorizontalAnchor::Left => width * 0.2,
        HorizontalAnchor::Center => width * 0.5,
        HorizontalAnchor::Right => width * 0.8,
    };
    let cy = height / 2.0 - 50.0;
    let side = radius * 2.0;
    let scale = (side / image.width() as f32).max(side / image.height() as f32);
    let transform = Transform::from_row(
        scale,
        0.0,
        0.0,
        scale,
        cx - image.width() as f32 * scale / 2.0,
        cy - image.height() as f32 * scale / 2.0,
    );

    if photo.circular {
        let mask = circle_mask(pixmap.width(), pixmap.height(), cx, cy, radius);
        pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            transform,
            mask.as_ref(),
        );
        // Thin ring around the clipped photo.
        let ring = styles::solid_paint(settings.visualizer.color, 0.9);
        styles::stroke_circle(pixmap, cx, cy, radius, &ring, &styles::round_stroke(4.0));
    } else {
        pixmap.draw_pixmap(0, 0, image.as_ref(), &PixmapPaint::default(), transform, None);
    }
}

fn circle_mask(width: u32, height: u32, cx: f32, cy: f32, radius: f32) -> Option<Mask> {
    let mut mask = Mask::new(width, height)?;
    let mut builder = tiny_skia::PathBuilder::new();
    builder.push_circle(cx, cy, radius);
    let path = builder.finish()?;
    mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
    Some(mask)
}

fn draw_logo(pixmap: &mut Pixmap, image: &Pixmap, settings: &Settings, width: f32, height: f32) {
    const PADDING: f32 = 40.0;
    let side = settings.logo.size * 2.0;
    let scale = side / image.width().max(image.height()) as f32;
    let drawn_w = image.width() as f32 * scale;
    let drawn_h = image.height() as f32 * scale;
    let (x, y) = match settings.logo.position {
        LogoAnchor::TopLeft => (PADDING, PADDING),
        LogoAnchor::TopRight => (width - drawn_w - PADDING, PADDING),
        LogoAnchor::BottomLeft => (PADDING, height - drawn_h - PADDING),
        LogoAnchor::BottomRight => (width - drawn_w - PADDING, height - drawn_h - PADDING),
        LogoAnchor::Center => ((width - drawn_w) / 2.0, (height - drawn_h) / 2.0),
    };
    pixmap.draw_pixmap(
        0,
        0,
        image.as_ref(),
        &PixmapPaint::default(),
        Transform::from_row(scale, 0.0, 0.0, scale, x, y),
        None,
    );
}

fn draw_text_block(pixmap: &mut Pixmap, font: &Font, settings: &Settings, width: f32, height: f32) {
    let text = &settings.text;
    let anchor_y = match text.position {
        VerticalAnchor::Top => height * 0.15,
        VerticalAnchor::Center => height * 0.5,
        VerticalAnchor::Bottom => height * 0.85,
    };
    let title_px = text.title_size * 2.0;
    if !text.title.is_empty() {
        draw_text_centered(pixmap, font, &text.title, title_px, text.color, 1.0, width / 2.0, anchor_y);
    }
    if !text.subtitle.is_empty() {
        let subtitle_y = anchor_y + title_px + 20.0;
        draw_text_centered(
            pixmap,
            font,
            &text.subtitle,
            text.subtitle_size * 2.0,
            text.color,
            0.667,
            width / 2.0,
            subtitle_y,
        );
    }
}

/// Rasterizes a single line of text centered on `center_x` with its baseline
/// at `baseline_y`, blending coverage into the premultiplied canvas.
fn draw_text_centered(
    pixmap: &mut Pixmap,
    font: &Font,
    text: &str,
    px: f32,
    color: crate::config::Color,
    alpha: f32,
    center_x: f32,
    baseline_y: f32,
) {
    let total_width: f32 = text
        .chars()
        .map(|c| font.metrics(c, px).advance_width)
        .sum();
    let mut pen_x = center_x - total_width / 2.0;
    let canvas_w = pixmap.width() as i32;
    let canvas_h = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for c in text.chars() {
        let (metrics, bitmap) = font.rasterize(c, px);
        let glyph_x = (pen_x + metrics.xmin as f32).round() as i32;
        let glyph_y = (baseline_y - metrics.ymin as f32 - metrics.height as f32).round() as i32;

        for row in 0..metrics.height {
            let y = glyph_y + row as i32;
            if y < 0 || y >= canvas_h {
                continue;
            }
            for col in 0..metrics.width {
                let x = glyph_x + col as i32;
                if x < 0 || x >= canvas_w {
                    continue;
                }
                let coverage = bitmap[row * metrics.width + col] as f32 / 255.0 * alpha;
                if coverage <= 0.0 {
                    continue;
                }
                let offset = ((y * canvas_w + x) * 4) as usize;
                blend_pixel(&mut data[offset..offset + 4], color, coverage);
            }
        }
        pen_x += metrics.advance_width;
    }
}

/// Source-over blend of one straight-alpha source pixel onto a premultiplied
/// destination pixel.
fn blend_pixel(dst: &mut [u8], color: crate::config::Color, src_alpha: f32) {
    let inv = 1.0 - src_alpha;
    let blend = |src: u8, dst: u8| -> u8 {
        (src as f32 * src_alpha + dst as f32 * inv).round().clamp(0.0, 255.0) as u8
    };
    dst[0] = blend(color.r, dst[0]);
    dst[1] = blend(color.g, dst[1]);
    dst[2] = blend(color.b, dst[2]);
    dst[3] = (255.0 * src_alpha + dst[3] as f32 * inv).round().clamp(0.0, 255.0) as u8;
}

/// Fixed-interval render driver. Calls the tick callback on a background
/// thread until stopped; ticks never overlap because they run sequentially on
/// the one thread.
pub struct RenderLoop {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoop {
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = std::thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                tick();
                std::thread::sleep(interval);
            }
        });
        Self {
            running,
            thread: Some(thread),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn renders_default_settings_without_assets() {
        let mut compositor = FrameCompositor::new().unwrap();
        let settings = Settings::default();
        let frame = AudioFrame::placeholder();
        compositor
            .render_frame(&settings, &frame, false, 0.5)
            .unwrap();

        let rgba = compositor.handle().copy_rgba().unwrap();
        assert_eq!(rgba.len(), (CANVAS_WIDTH * CANVAS_HEIGHT * 4) as usize);
        // Opaque black background plus the idle visualization.
        assert!(rgba.chunks_exact(4).all(|px| px[3] == 255));
        assert!(rgba.chunks_exact(4).any(|px| px[0] != 0 || px[1] != 0 || px[2] != 0));
    }

    #[test]
    fn transparent_background_leaves_unpainted_pixels_clear() {
        let mut compositor = FrameCompositor::new().unwrap();
        let mut settings = Settings::default();
        settings.background.transparent = true;
        compositor
            .render_frame(&settings, &AudioFrame::placeholder(), false, 0.0)
            .unwrap();

        let rgba = compositor.handle().copy_rgba().unwrap();
        // Corners stay untouched by the centered idle visualization.
        assert_eq!(rgba[3], 0);
    }

    #[test]
    fn settings_changes_apply_on_next_frame() {
        let mut compositor = FrameCompositor::new().unwrap();
        let mut settings = Settings::default();
        let frame = AudioFrame::placeholder();

        compositor.render_frame(&settings, &frame, false, 0.0).unwrap();
        let before = compositor.handle().copy_rgba().unwrap();

        settings.background.color = crate::config::Color::new(0x20, 0x40, 0x60);
        compositor.render_frame(&settings, &frame, false, 0.0).unwrap();
        let after = compositor.handle().copy_rgba().unwrap();

        assert_ne!(before, after);
        assert_eq!(&after[0..3], &[0x20, 0x40, 0x60]);
    }

    #[test]
    fn idle_frame_is_well_formed() {
        let frame = idle_frame(1.0);
        assert_eq!(frame.frequency.len(), DEFAULT_FREQUENCY_LEN);
        assert_eq!(frame.time_domain.len(), DEFAULT_TIME_DOMAIN_LEN);
        assert!((frame.average_amplitude - 0.2).abs() < f32::EPSILON);
        assert!(frame.frequency.iter().all(|&v| v <= 70));
    }

    #[test]
    fn render_loop_ticks_until_stopped() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut render_loop = RenderLoop::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(60));
        render_loop.stop();
        let after_stop = ticks.load(Ordering::SeqCst);
        assert!(after_stop >= 2);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
    }
}
