//! Stroke, fill and font styles.

use peniko::Color;
use serde::{Deserialize, Serialize};

/// RGBA8 color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Format as `#RRGGBBAA`.
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
        match hex.len() {
            3 => {
                let r = u8::from_str_radix(hex.get(0..1)?, 16).ok()? * 17;
                let g = u8::from_str_radix(hex.get(1..2)?, 16).ok()? * 17;
                let b = u8::from_str_radix(hex.get(2..3)?, 16).ok()? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Some(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => None,
        }
    }
}

impl From<Color> for Rgba {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<Rgba> for Color {
    fn from(color: Rgba) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Dash pattern of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashPattern {
    /// No outline at all.
    NoPen,
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
}

impl DashPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashPattern::NoPen => "no_pen",
            DashPattern::Solid => "solid",
            DashPattern::Dash => "dash",
            DashPattern::Dot => "dot",
            DashPattern::DashDot => "dash_dot",
            DashPattern::DashDotDot => "dash_dot_dot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "no_pen" => Some(DashPattern::NoPen),
            "solid" => Some(DashPattern::Solid),
            "dash" => Some(DashPattern::Dash),
            "dot" => Some(DashPattern::Dot),
            "dash_dot" => Some(DashPattern::DashDot),
            "dash_dot_dot" => Some(DashPattern::DashDotDot),
            _ => None,
        }
    }
}

/// Outline style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Rgba,
    pub width: u32,
    #[serde(default)]
    pub dash: DashPattern,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: Rgba::black(),
            width: 1,
            dash: DashPattern::Solid,
        }
    }
}

/// Interior style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStyle {
    pub color: Rgba,
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            color: Rgba::transparent(),
        }
    }
}

/// Font used by text nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub point_size: u32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Sans Serif".to_string(),
            point_size: 12,
            bold: false,
            italic: false,
            underline: false,
        }
    }
}
