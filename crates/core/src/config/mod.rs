use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{styles::StyleId, OverlayError, Result};

/// Gain multiplier range accepted by the smoothing engine.
pub const SENSITIVITY_RANGE: (f32, f32) = (0.1, 8.0);
/// Release-softness range accepted by the smoothing engine.
pub const SMOOTHNESS_RANGE: (f32, f32) = (0.0, 1.0);

/// Opaque sRGB colour stored as `#rrggbb` in serialized settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#rrggbb` hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(OverlayError::InvalidInput(
                "colors must be 6-digit hex strings",
            ));
        }
        let parse = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| OverlayError::InvalidInput("colors must be 6-digit hex strings"))
        };
        Ok(Self {
            r: parse(0..2)?,
            g: parse(2..4)?,
            b: parse(4..6)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = OverlayError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

/// Vertical anchor used by the visualization and the text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerticalAnchor {
    Top,
    Center,
    Bottom,
}

/// Horizontal anchor used by the photo/avatar layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HorizontalAnchor {
    Left,
    Center,
    Right,
}

/// The five corner/center anchors available to the logo layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoAnchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

/// Background layer settings: solid colour, covering image, or nothing at all
/// (for chroma-free overlay compositing downstream).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSettings {
    pub color: Color,
    pub image: Option<PathBuf>,
    pub transparent: bool,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            color: Color::new(0x00, 0x00, 0x00),
            image: None,
            transparent: false,
        }
    }
}

/// Visualization layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerSettings {
    pub style: StyleId,
    pub color: Color,
    pub secondary_color: Color,
    /// Scale factor in percent; 100 means nominal size.
    pub size: f32,
    pub position: VerticalAnchor,
    pub sensitivity: f32,
    pub smoothness: f32,
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            style: StyleId::default(),
            color: Color::new(0x8b, 0x5c, 0xf6),
            secondary_color: Color::new(0xa8, 0x55, 0xf7),
            size: 100.0,
            position: VerticalAnchor::Center,
            sensitivity: 2.0,
            smoothness: 0.7,
        }
    }
}

impl VisualizerSettings {
    /// Sensitivity clamped to the valid [0.1, 8] range.
    pub fn clamped_sensitivity(&self) -> f32 {
        self.sensitivity.clamp(SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1)
    }

    /// Smoothness clamped to the valid [0, 1] range.
    pub fn clamped_smoothness(&self) -> f32 {
        self.smoothness.clamp(SMOOTHNESS_RANGE.0, SMOOTHNESS_RANGE.1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoSettings {
    pub image: Option<PathBuf>,
    pub position: LogoAnchor,
    pub size: f32,
}

impl Default for LogoSettings {
    fn default() -> Self {
        Self {
            image: None,
            position: LogoAnchor::TopLeft,
            size: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoSettings {
    pub image: Option<PathBuf>,
    pub position: HorizontalAnchor,
    pub size: f32,
    pub circular: bool,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            image: None,
            position: HorizontalAnchor::Center,
            size: 150.0,
            circular: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub title: String,
    pub subtitle: String,
    pub color: Color,
    pub title_size: f32,
    pub subtitle_size: f32,
    pub position: VerticalAnchor,
    /// Optional TTF/OTF to render with. When unset, a handful of common
    /// system font locations are tried; without any font the text layer is
    /// skipped.
    pub font: Option<PathBuf>,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            color: Color::new(0xff, 0xff, 0xff),
            title_size: 32.0,
            subtitle_size: 18.0,
            position: VerticalAnchor::Bottom,
            font: None,
        }
    }
}

/// The full configuration object consumed read-only each frame. Binary assets
/// are referenced by path; the core never persists anything itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub background: BackgroundSettings,
    pub visualizer: VisualizerSettings,
    pub logo: LogoSettings,
    pub photo: PhotoSettings,
    pub text: TextSettings,
}

impl Settings {
    /// Parses settings from a JSON document, filling omitted fields with the
    /// product defaults so documents written by older versions keep loading.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|_| OverlayError::InvalidInput("settings document is not valid JSON"))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|_| OverlayError::InvalidInput("settings could not be serialized"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        let color = Color::from_hex("#8b5cf6").unwrap();
        assert_eq!(color, Color::new(0x8b, 0x5c, 0xf6));
        assert_eq!(color.to_hex(), "#8b5cf6");
        assert!(Color::from_hex("#zzz").is_err());
    }

    #[test]
    fn defaults_match_product_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.visualizer.style, StyleId::WaveformGentle);
        assert_eq!(settings.visualizer.sensitivity, 2.0);
        assert_eq!(settings.visualizer.smoothness, 0.7);
        assert_eq!(settings.photo.circular, true);
        assert_eq!(settings.text.position, VerticalAnchor::Bottom);
    }

    #[test]
    fn partial_documents_fill_with_defaults() {
        let settings =
            Settings::from_json(r##"{"visualizer":{"style":"bars","sensitivity":4.0}}"##).unwrap();
        assert_eq!(settings.visualizer.style, StyleId::Bars);
        assert_eq!(settings.visualizer.sensitivity, 4.0);
        assert_eq!(settings.visualizer.smoothness, 0.7);
        assert_eq!(settings.background.color, Color::new(0, 0, 0));
    }

    #[test]
    fn sensitivity_and_smoothness_clamp_on_read() {
        let mut settings = Settings::default();
        settings.visualizer.sensitivity = 100.0;
        settings.visualizer.smoothness = -3.0;
        assert_eq!(settings.visualizer.clamped_sensitivity(), 8.0);
        assert_eq!(settings.visualizer.clamped_smoothness(), 0.0);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let mut settings = Settings::default();
        settings.text.title = "My Podcast".to_string();
        settings.visualizer.position = VerticalAnchor::Top;
        let json = settings.to_json().unwrap();
        let restored = Settings::from_json(&json).unwrap();
        assert_eq!(restored.text.title, "My Podcast");
        assert_eq!(restored.visualizer.position, VerticalAnchor::Top);
    }
}
