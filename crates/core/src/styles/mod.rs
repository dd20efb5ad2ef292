//! Style renderer registry: a pure mapping from a style identifier to a draw
//! function. Each draw function is a deterministic function of the stabilized
//! audio data, the layout configuration, and wall-clock seconds (for slow
//! ambient motion); none of them retain state between frames.

mod bars;
mod circular;
mod minimal;
mod waveform;

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tiny_skia::{
    FillRule, GradientStop, LinearGradient, Paint, Path, PathBuilder, Pixmap, Point,
    RadialGradient, Shader, SpreadMode, Stroke, Transform,
};

use crate::{config::Color, smoothing::AudioFrame};

/// Closed set of visual styles, grouped as waveform/circular/bars/minimal
/// families with energetic and gentle variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StyleId {
    Waveform,
    Bars,
    Circular,
    Minimal,
    #[default]
    WaveformGentle,
    WaveformFlowing,
    CircularBreathe,
    CircularOrbital,
    CircularRipples,
    BarsSmooth,
    MinimalCalm,
    MinimalDot,
    MinimalLine,
}

impl StyleId {
    pub const ALL: [StyleId; 13] = [
        StyleId::Waveform,
        StyleId::Bars,
        StyleId::Circular,
        StyleId::Minimal,
        StyleId::WaveformGentle,
        StyleId::WaveformFlowing,
        StyleId::CircularBreathe,
        StyleId::CircularOrbital,
        StyleId::CircularRipples,
        StyleId::BarsSmooth,
        StyleId::MinimalCalm,
        StyleId::MinimalDot,
        StyleId::MinimalLine,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StyleId::Waveform => "waveform",
            StyleId::Bars => "bars",
            StyleId::Circular => "circular",
            StyleId::Minimal => "minimal",
            StyleId::WaveformGentle => "waveform-gentle",
            StyleId::WaveformFlowing => "waveform-flowing",
            StyleId::CircularBreathe => "circular-breathe",
            StyleId::CircularOrbital => "circular-orbital",
            StyleId::CircularRipples => "circular-ripples",
            StyleId::BarsSmooth => "bars-smooth",
            StyleId::MinimalCalm => "minimal-calm",
            StyleId::MinimalDot => "minimal-dot",
            StyleId::MinimalLine => "minimal-line",
        }
    }

    /// Resolves a stored identifier. Unknown identifiers (e.g. written by a
    /// newer version) fall back to the default style instead of failing.
    pub fn parse(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == id)
            .unwrap_or_default()
    }
}

impl fmt::Display for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StyleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StyleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = StyleId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a style identifier string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<StyleId, E> {
                Ok(StyleId::parse(value))
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

/// Per-frame layout configuration, derived deterministically from the user
/// settings and the canvas dimensions. Immutable per frame.
#[derive(Debug, Clone, Copy)]
pub struct VisualConfig {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Color,
    pub secondary_color: Color,
    /// Scale factor where 1.0 is nominal size.
    pub size: f32,
}

/// Paints one frame of the requested style onto the canvas.
pub fn draw(
    style: StyleId,
    pixmap: &mut Pixmap,
    frame: &AudioFrame,
    config: &VisualConfig,
    seconds: f64,
) {
    let amplitude = frame.average_amplitude;
    match style {
        StyleId::Waveform => waveform::draw_waveform(pixmap, &frame.time_domain, config),
        StyleId::Bars => bars::draw_frequency_bars(pixmap, &frame.frequency, config),
        StyleId::Circular => circular::draw_circular(pixmap, &frame.frequency, amplitude, config),
        StyleId::Minimal => minimal::draw_minimal_pulse(pixmap, amplitude, config, seconds),
        StyleId::WaveformGentle => {
            waveform::draw_waveform_gentle(pixmap, &frame.time_domain, config)
        }
        StyleId::WaveformFlowing => {
            waveform::draw_flowing_wave(pixmap, &frame.time_domain, config, seconds)
        }
        StyleId::CircularBreathe => circular::draw_circular_breathe(pixmap, amplitude, config),
        StyleId::CircularOrbital => {
            circular::draw_orbital_rings(pixmap, amplitude, config, seconds)
        }
        StyleId::CircularRipples => circular::draw_soft_ripples(pixmap, amplitude, config, seconds),
        StyleId::BarsSmooth => bars::draw_bars_smooth(pixmap, &frame.frequency, config),
        StyleId::MinimalCalm => minimal::draw_minimal_calm(pixmap, amplitude, config, seconds),
        StyleId::MinimalDot => minimal::draw_floating_dot(pixmap, amplitude, config, seconds),
        StyleId::MinimalLine => minimal::draw_line_pulse(pixmap, amplitude, config),
    }
}

// Shared drawing helpers for the style implementations.

pub(crate) fn rgba(color: Color, alpha: f32) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(
        color.r,
        color.g,
        color.b,
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

pub(crate) fn solid_paint(color: Color, alpha: f32) -> Paint<'static> {
    shader_paint(Shader::SolidColor(rgba(color, alpha)))
}

pub(crate) fn shader_paint(shader: Shader<'static>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.anti_alias = true;
    paint.shader = shader;
    paint
}

pub(crate) fn stop(position: f32, color: Color, alpha: f32) -> GradientStop {
    GradientStop::new(position, rgba(color, alpha))
}

pub(crate) fn linear_gradient(
    from: (f32, f32),
    to: (f32, f32),
    stops: Vec<GradientStop>,
    fallback: Color,
) -> Shader<'static> {
    LinearGradient::new(
        Point::from_xy(from.0, from.1),
        Point::from_xy(to.0, to.1),
        stops,
        SpreadMode::Pad,
        Transform::identity(),
    )
    .unwrap_or(Shader::SolidColor(rgba(fallback, 1.0)))
}

/// Radial gradient between an inner and an outer radius around one center.
/// Stop positions are given on the inner..outer span and remapped onto the
/// single-radius gradient tiny-skia supports.
pub(crate) fn radial_gradient(
    center: (f32, f32),
    inner_radius: f32,
    outer_radius: f32,
    stops: Vec<(f32, tiny_skia::Color)>,
    fallback: Color,
) -> Shader<'static> {
    if outer_radius <= 0.0 || outer_radius <= inner_radius {
        return Shader::SolidColor(rgba(fallback, 1.0));
    }
    let span = (outer_radius - inner_radius) / outer_radius;
    let base = inner_radius / outer_radius;
    let remapped = stops
        .into_iter()
        .map(|(position, color)| {
            GradientStop::new((base + position * span).clamp(0.0, 1.0), color)
        })
        .collect();
    RadialGradient::new(
        Point::from_xy(center.0, center.1),
        Point::from_xy(center.0, center.1),
        outer_radius,
        remapped,
        SpreadMode::Pad,
        Transform::identity(),
    )
    .unwrap_or(Shader::SolidColor(rgba(fallback, 1.0)))
}

pub(crate) fn round_stroke(width: f32) -> Stroke {
    Stroke {
        width: width.max(0.1),
        line_cap: tiny_skia::LineCap::Round,
        line_join: tiny_skia::LineJoin::Round,
        ..Stroke::default()
    }
}

pub(crate) fn polyline(points: &[(f32, f32)]) -> Option<Path> {
    if points.len() < 2 {
        return None;
    }
    let mut builder = PathBuilder::new();
    builder.move_to(points[0].0, points[0].1);
    for &(x, y) in &points[1..] {
        builder.line_to(x, y);
    }
    builder.finish()
}

/// Smooth curve through the points using quadratic segments to midpoints.
pub(crate) fn smooth_polyline(points: &[(f32, f32)]) -> Option<Path> {
    if points.len() < 3 {
        return polyline(points);
    }
    let mut builder = PathBuilder::new();
    builder.move_to(points[0].0, points[0].1);
    for i in 1..points.len() - 1 {
        let (cx, cy) = points[i];
        let (nx, ny) = points[i + 1];
        builder.quad_to(cx, cy, (cx + nx) / 2.0, (cy + ny) / 2.0);
    }
    let (cx, cy) = points[points.len() - 2];
    let (lx, ly) = points[points.len() - 1];
    builder.quad_to(cx, cy, lx, ly);
    builder.finish()
}

pub(crate) fn circle_path(cx: f32, cy: f32, radius: f32) -> Option<Path> {
    if radius <= 0.0 {
        return None;
    }
    let mut builder = PathBuilder::new();
    builder.push_circle(cx, cy, radius);
    builder.finish()
}

pub(crate) fn fill_circle(pixmap: &mut Pixmap, cx: f32, cy: f32, radius: f32, paint: &Paint) {
    if let Some(path) = circle_path(cx, cy, radius) {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

pub(crate) fn stroke_circle(
    pixmap: &mut Pixmap,
    cx: f32,
    cy: f32,
    radius: f32,
    paint: &Paint,
    stroke: &Stroke,
) {
    if let Some(path) = circle_path(cx, cy, radius) {
        pixmap.stroke_path(&path, paint, stroke, Transform::identity(), None);
    }
}

pub(crate) fn rounded_rect(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Option<Path> {
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    let radius = radius.min(width / 2.0).min(height / 2.0);
    let mut builder = PathBuilder::new();
    builder.move_to(x + radius, y);
    builder.line_to(x + width - radius, y);
    builder.quad_to(x + width, y, x + width, y + radius);
    builder.line_to(x + width, y + height - radius);
    builder.quad_to(x + width, y + height, x + width - radius, y + height);
    builder.line_to(x + radius, y + height);
    builder.quad_to(x, y + height, x, y + height - radius);
    builder.line_to(x, y + radius);
    builder.quad_to(x, y, x + radius, y);
    builder.close();
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VisualConfig {
        VisualConfig {
            center_x: 960.0,
            center_y: 540.0,
            width: 1536.0,
            height: 324.0,
            color: Color::new(0x8b, 0x5c, 0xf6),
            secondary_color: Color::new(0xa8, 0x55, 0xf7),
            size: 1.0,
        }
    }

    fn active_frame() -> AudioFrame {
        let frequency: Vec<u8> = (0..128).map(|i| 60 + (i % 120) as u8).collect();
        let time_domain: Vec<u8> = (0..256)
            .map(|i| (128.0 + 80.0 * ((i as f32) * 0.12).sin()) as u8)
            .collect();
        let average_amplitude = crate::smoothing::average_amplitude(&frequency);
        AudioFrame {
            frequency,
            time_domain,
            average_amplitude,
        }
    }

    #[test]
    fn unknown_identifiers_fall_back_to_default_style() {
        assert_eq!(StyleId::parse("waveform"), StyleId::Waveform);
        assert_eq!(StyleId::parse("bars-smooth"), StyleId::BarsSmooth);
        assert_eq!(StyleId::parse("plasma-storm"), StyleId::WaveformGentle);
        assert_eq!(StyleId::parse(""), StyleId::WaveformGentle);
    }

    #[test]
    fn identifiers_round_trip_through_serde() {
        for style in StyleId::ALL {
            let json = serde_json::to_string(&style).unwrap();
            let back: StyleId = serde_json::from_str(&json).unwrap();
            assert_eq!(style, back);
        }
        let unknown: StyleId = serde_json::from_str("\"not-a-style\"").unwrap();
        assert_eq!(unknown, StyleId::default());
    }

    #[test]
    fn every_style_paints_without_mutating_its_inputs() {
        let config = test_config();
        let frame = active_frame();
        let frequency_before = frame.frequency.clone();
        let time_before = frame.time_domain.clone();

        for style in StyleId::ALL {
            let mut pixmap = Pixmap::new(1920, 1080).unwrap();
            draw(style, &mut pixmap, &frame, &config, 1.25);
            let painted = pixmap.data().iter().any(|&byte| byte != 0);
            assert!(painted, "style {style} painted nothing");
        }

        assert_eq!(frame.frequency, frequency_before);
        assert_eq!(frame.time_domain, time_before);
    }

    #[test]
    fn styles_are_deterministic_for_fixed_inputs() {
        let config = test_config();
        let frame = active_frame();
        for style in [StyleId::Circular, StyleId::MinimalDot, StyleId::WaveformFlowing] {
            let mut first = Pixmap::new(640, 360).unwrap();
            let mut second = Pixmap::new(640, 360).unwrap();
            let small = VisualConfig {
                center_x: 320.0,
                center_y: 180.0,
                width: 512.0,
                height: 108.0,
                ..config
            };
            draw(style, &mut first, &frame, &small, 2.5);
            draw(style, &mut second, &frame, &small, 2.5);
            assert_eq!(first.data(), second.data(), "style {style} not deterministic");
        }
    }

    #[test]
    fn placeholder_frames_render_safely() {
        let config = test_config();
        let frame = AudioFrame::placeholder();
        for style in StyleId::ALL {
            let mut pixmap = Pixmap::new(1920, 1080).unwrap();
            draw(style, &mut pixmap, &frame, &config, 0.0);
        }
    }
}
