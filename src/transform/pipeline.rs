//! Package → primitive operation mapping
//!
//! A [`Pipeline`] is the engine-neutral description of one derivative. The
//! builder owns every decision about *what* to do; engines only decide *how*.

use crate::error::{DerivoError, DerivoResult};
use crate::package::{Gravity, PackageConfig, PackageKind, Watermark};
use crate::source::{under_root, SourceImage};
use std::path::PathBuf;

/// A single primitive image operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Scale to fit within the box; `flags` are GraphicsMagick geometry flags
    ResizeToFit {
        width: u32,
        height: u32,
        flags: Option<String>,
    },
    /// Scale to cover the box, then crop it exactly at gravity plus offset
    ResizeToCover {
        width: u32,
        height: u32,
        gravity: Gravity,
        x: i32,
        y: i32,
    },
    /// Scale to fit, then pad to the exact box with a background colour
    ResizeAndPad {
        width: u32,
        height: u32,
        gravity: Gravity,
        background: String,
    },
    /// Encoder quality, 0-100
    Quality(u8),
    /// Progressive encoding with a chroma sampling hint
    Progressive { sampling_factor: String },
    Gamma(f32),
    /// Brightness, saturation and hue in percent (100 = unchanged)
    Modulate {
        brightness: u16,
        saturation: u16,
        hue: u16,
    },
    DrawText {
        text: String,
        color: String,
        size: u32,
        gravity: Gravity,
        font: Option<String>,
        offset: (i32, i32),
    },
    Composite {
        src: PathBuf,
        gravity: Gravity,
        offset: (i32, i32),
    },
}

/// Ordered operations plus the output format (an extension)
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub operations: Vec<Operation>,
    pub format: String,
}

impl Pipeline {
    /// Quality requested by the pipeline, if any
    pub fn quality(&self) -> Option<u8> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::Quality(q) => Some(*q),
            _ => None,
        })
    }
}

/// Fixed optimization recipe
struct OptimizePreset {
    sampling_factor: &'static str,
    gamma: f32,
    brightness: u16,
    saturation: u16,
    hue: u16,
}

const OPTIMIZE_LIGHT: OptimizePreset = OptimizePreset {
    sampling_factor: "2x2",
    gamma: 0.9,
    brightness: 100,
    saturation: 110,
    hue: 100,
};

const OPTIMIZE_STRONG: OptimizePreset = OptimizePreset {
    sampling_factor: "2x2",
    gamma: 0.8,
    brightness: 102,
    saturation: 120,
    hue: 100,
};

fn optimize_preset(level: u8) -> Option<&'static OptimizePreset> {
    match level {
        1 => Some(&OPTIMIZE_LIGHT),
        2 => Some(&OPTIMIZE_STRONG),
        _ => None,
    }
}

/// Parse an offset geometry such as `+10+10` or `-4+0`
pub fn parse_offset(geometry: &str) -> Option<(i32, i32)> {
    let geometry = geometry.trim();
    let split = geometry
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i)?;

    let (x, y) = geometry.split_at(split);
    let x = x.strip_prefix('+').unwrap_or(x).parse().ok()?;
    let y = y.strip_prefix('+').unwrap_or(y).parse().ok()?;
    Some((x, y))
}

/// Builds pipelines for packages
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    root: PathBuf,
}

impl PipelineBuilder {
    /// `root` resolves relative watermark sources
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Turn a package into the operations for one source record
    pub fn build(
        &self,
        name: &str,
        package: &PackageConfig,
        source: &SourceImage,
        format: &str,
    ) -> DerivoResult<Pipeline> {
        let mut operations = Vec::new();

        match package.kind {
            PackageKind::Resize => {
                let (width, height) = dimensions(name, package)?;
                operations.push(Operation::ResizeToFit {
                    width,
                    height,
                    flags: package.options.clone().filter(|o| !o.is_empty()),
                });
            }
            PackageKind::Recrop => {
                let (width, height) = dimensions(name, package)?;
                operations.push(Operation::ResizeToCover {
                    width,
                    height,
                    gravity: package.gravity,
                    x: package.x,
                    y: package.y,
                });
            }
            PackageKind::Fill => {
                let (width, height) = dimensions(name, package)?;
                operations.push(Operation::ResizeAndPad {
                    width,
                    height,
                    gravity: package.gravity,
                    background: package.color.clone(),
                });
            }
            PackageKind::Original => {}
        }

        operations.push(Operation::Quality(package.quality));

        if let Some(preset) = optimize_preset(package.optimize) {
            operations.push(Operation::Progressive {
                sampling_factor: preset.sampling_factor.to_string(),
            });
            operations.push(Operation::Gamma(preset.gamma));
            operations.push(Operation::Modulate {
                brightness: preset.brightness,
                saturation: preset.saturation,
                hue: preset.hue,
            });
        }

        match &package.watermark {
            Some(Watermark::Text(style)) => {
                if let Some(text) = source.watermark() {
                    operations.push(Operation::DrawText {
                        text: text.to_string(),
                        color: style.text_color.clone(),
                        size: style.text_size,
                        gravity: style.gravity,
                        font: style.font.clone(),
                        offset: (style.position[0], style.position[1]),
                    });
                }
            }
            Some(Watermark::Image(overlay)) if !overlay.src.is_empty() => {
                let offset = parse_offset(&overlay.geometry).ok_or_else(|| {
                    DerivoError::configuration(
                        name,
                        format!("watermark geometry {:?} is not +x+y", overlay.geometry),
                    )
                })?;
                operations.push(Operation::Composite {
                    src: self.resolve_asset(&overlay.src),
                    gravity: overlay.gravity,
                    offset,
                });
            }
            _ => {}
        }

        Ok(Pipeline {
            operations,
            format: format.to_string(),
        })
    }

    fn resolve_asset(&self, src: &str) -> PathBuf {
        under_root(&self.root, src)
    }
}

fn dimensions(name: &str, package: &PackageConfig) -> DerivoResult<(u32, u32)> {
    match (package.width, package.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        (w, h) => Err(DerivoError::configuration(
            name,
            format!(
                "type {} needs a non-zero size, got {}x{}",
                package.kind,
                w.unwrap_or(0),
                h.unwrap_or(0)
            ),
        )),
    }
}
