//! Package definitions
//!
//! A package is a named, declarative description of one derivative:
//! its geometry, encoding quality, optional optimization preset and
//! optional watermark. Packages are deserialized from `[packages.<name>]`
//! tables and never change after load.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometry mode of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    /// Fit within the box, keeping aspect ratio
    Resize,
    /// Cover the box, then crop to it exactly
    Recrop,
    /// Fit within the box, then pad to it exactly
    Fill,
    /// Keep the source geometry, only re-encode
    Original,
}

impl PackageKind {
    /// Whether this kind needs a target width and height
    pub fn is_sizing(&self) -> bool {
        !matches!(self, Self::Original)
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resize => "resize",
            Self::Recrop => "recrop",
            Self::Fill => "fill",
            Self::Original => "original",
        };
        write!(f, "{}", name)
    }
}

/// Named anchor used for cropping, padding and watermark placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    #[default]
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    /// Name as understood by GraphicsMagick's `-gravity`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NorthWest => "NorthWest",
            Self::North => "North",
            Self::NorthEast => "NorthEast",
            Self::West => "West",
            Self::Center => "Center",
            Self::East => "East",
            Self::SouthWest => "SouthWest",
            Self::South => "South",
            Self::SouthEast => "SouthEast",
        }
    }

    /// Top-left offset of an `inner` box anchored inside an `outer` box
    ///
    /// Offsets saturate at zero when the inner box is larger.
    pub fn anchor(&self, outer: (u32, u32), inner: (u32, u32)) -> (u32, u32) {
        let free_x = outer.0.saturating_sub(inner.0);
        let free_y = outer.1.saturating_sub(inner.1);

        let x = match self {
            Self::NorthWest | Self::West | Self::SouthWest => 0,
            Self::North | Self::Center | Self::South => free_x / 2,
            Self::NorthEast | Self::East | Self::SouthEast => free_x,
        };
        let y = match self {
            Self::NorthWest | Self::North | Self::NorthEast => 0,
            Self::West | Self::Center | Self::East => free_y / 2,
            Self::SouthWest | Self::South | Self::SouthEast => free_y,
        };

        (x, y)
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Watermark attached to a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Watermark {
    /// Overlay an image file
    Image(ImageWatermark),
    /// Draw the source record's watermark text
    Text(TextWatermark),
}

/// Image overlay watermark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageWatermark {
    /// Overlay file, relative paths resolve against the server root
    pub src: String,

    #[serde(default = "default_watermark_gravity")]
    pub gravity: Gravity,

    /// Offset geometry such as `+10+10`
    #[serde(default = "default_geometry")]
    pub geometry: String,
}

/// Text watermark styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextWatermark {
    #[serde(default = "default_text_color", alias = "textColor")]
    pub text_color: String,

    #[serde(default = "default_text_size", alias = "textSize")]
    pub text_size: u32,

    #[serde(default = "default_watermark_gravity")]
    pub gravity: Gravity,

    #[serde(default)]
    pub font: Option<String>,

    /// Offset from the gravity anchor
    #[serde(default = "default_position")]
    pub position: [i32; 2],
}

fn default_watermark_gravity() -> Gravity {
    Gravity::SouthEast
}

fn default_geometry() -> String {
    "+10+10".to_string()
}

fn default_text_color() -> String {
    "white".to_string()
}

fn default_text_size() -> u32 {
    24
}

fn default_position() -> [i32; 2] {
    [10, 10]
}

fn default_quality() -> u8 {
    80
}

fn default_color() -> String {
    "white".to_string()
}

/// One named transform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(rename = "type")]
    pub kind: PackageKind,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,

    /// Encoding quality, 0-100
    #[serde(default = "default_quality")]
    pub quality: u8,

    #[serde(default)]
    pub gravity: Gravity,

    #[serde(default)]
    pub x: i32,

    #[serde(default)]
    pub y: i32,

    /// Background used by `fill`
    #[serde(default = "default_color")]
    pub color: String,

    /// Output extension override
    #[serde(default, alias = "forceType", skip_serializing_if = "Option::is_none")]
    pub force_type: Option<String>,

    /// Optimization preset: 0 off, 1 and 2 named recipes
    #[serde(default)]
    pub optimize: u8,

    /// Engine-specific resize flags for `resize` (`!`, `>`, `<`, `^`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
}

impl PackageConfig {
    /// Create a package of the given kind with defaults for everything else
    pub fn new(kind: PackageKind) -> Self {
        Self {
            kind,
            width: None,
            height: None,
            quality: default_quality(),
            gravity: Gravity::default(),
            x: 0,
            y: 0,
            color: default_color(),
            force_type: None,
            optimize: 0,
            options: None,
            watermark: None,
        }
    }

    /// Builder-style target size
    pub fn sized(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Builder-style extension override
    pub fn forcing(mut self, extension: impl Into<String>) -> Self {
        self.force_type = Some(extension.into());
        self
    }

    /// Extension actually produced for a requested extension
    pub fn output_extension<'a>(&'a self, requested: &'a str) -> &'a str {
        self.force_type.as_deref().unwrap_or(requested)
    }

    /// The stock `thumb` package: 200x200 center recrop at quality 80
    pub fn thumb() -> Self {
        Self::new(PackageKind::Recrop).sized(200, 200)
    }
}
