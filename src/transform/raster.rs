//! In-process engine built on the `image` crate
//!
//! Decoding, resampling and encoding run on the blocking pool. Text drawing
//! and interlace hints have no pure-Rust counterpart here and are skipped
//! with a log line; use the GraphicsMagick engine when those matter.

use crate::package::Gravity;
use crate::transform::engine::{EngineError, TransformEngine};
use crate::transform::pipeline::{Operation, Pipeline};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILTER: FilterType = FilterType::Lanczos3;

/// Pure-Rust engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransformEngine for RasterEngine {
    async fn is_available(&self) -> bool {
        true
    }

    async fn render(
        &self,
        source: &Path,
        pipeline: &Pipeline,
        output: &Path,
    ) -> Result<(), EngineError> {
        let source: PathBuf = source.to_path_buf();
        let output: PathBuf = output.to_path_buf();
        let pipeline = pipeline.clone();

        tokio::task::spawn_blocking(move || render_blocking(&source, &pipeline, &output))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
    }

    fn engine_name(&self) -> &'static str {
        "raster"
    }
}

fn render_blocking(source: &Path, pipeline: &Pipeline, output: &Path) -> Result<(), EngineError> {
    debug!(
        "Rendering {} with {} operations",
        source.display(),
        pipeline.operations.len()
    );

    let mut img = decode(source)?;
    for op in &pipeline.operations {
        img = apply(img, op)?;
    }

    encode(&img, pipeline, output)
}

/// Decode by content, so uploads stored without an extension still open
fn decode(path: &Path) -> Result<DynamicImage, EngineError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

fn apply(img: DynamicImage, op: &Operation) -> Result<DynamicImage, EngineError> {
    let img = match op {
        Operation::ResizeToFit {
            width,
            height,
            flags,
        } => resize_with_flags(img, *width, *height, flags.as_deref()),
        Operation::ResizeToCover {
            width,
            height,
            gravity,
            x,
            y,
        } => resize_and_crop(img, *width, *height, *gravity, *x, *y),
        Operation::ResizeAndPad {
            width,
            height,
            gravity,
            background,
        } => {
            let background = parse_color(background)?;
            resize_and_pad(img, *width, *height, *gravity, background)
        }
        Operation::Quality(_) => img,
        Operation::Progressive { sampling_factor } => {
            debug!(
                "Interlace hint (sampling {}) not supported by raster engine",
                sampling_factor
            );
            img
        }
        Operation::Gamma(gamma) => adjust_gamma(img, *gamma),
        Operation::Modulate {
            brightness,
            saturation,
            hue,
        } => modulate(img, *brightness, *saturation, *hue),
        Operation::DrawText { .. } => {
            warn!("Raster engine cannot draw text, skipping text watermark");
            img
        }
        Operation::Composite {
            src,
            gravity,
            offset,
        } => composite(img, src, *gravity, *offset)?,
    };
    Ok(img)
}

/// Size that covers the target box while keeping aspect ratio
fn cover_size(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let scale = (target.0 as f64 / sw).max(target.1 as f64 / sh);
    let w = ((sw * scale).round() as u32).max(target.0);
    let h = ((sh * scale).round() as u32).max(target.1);
    (w, h)
}

fn resize_with_flags(
    img: DynamicImage,
    width: u32,
    height: u32,
    flags: Option<&str>,
) -> DynamicImage {
    let flags = flags.unwrap_or("");
    if flags.contains('!') {
        img.resize_exact(width, height, FILTER)
    } else if flags.contains('^') {
        let (w, h) = cover_size((img.width(), img.height()), (width, height));
        img.resize_exact(w, h, FILTER)
    } else if flags.contains('>') {
        if img.width() > width || img.height() > height {
            img.resize(width, height, FILTER)
        } else {
            img
        }
    } else if flags.contains('<') {
        if img.width() < width && img.height() < height {
            img.resize(width, height, FILTER)
        } else {
            img
        }
    } else {
        img.resize(width, height, FILTER)
    }
}

fn resize_and_crop(
    img: DynamicImage,
    width: u32,
    height: u32,
    gravity: Gravity,
    x: i32,
    y: i32,
) -> DynamicImage {
    let (cw, ch) = cover_size((img.width(), img.height()), (width, height));
    let scaled = img.resize_exact(cw, ch, FILTER);

    let (ax, ay) = gravity.anchor((cw, ch), (width, height));
    let cx = (i64::from(ax) + i64::from(x)).clamp(0, i64::from(cw - width)) as u32;
    let cy = (i64::from(ay) + i64::from(y)).clamp(0, i64::from(ch - height)) as u32;

    scaled.crop_imm(cx, cy, width, height)
}

fn resize_and_pad(
    img: DynamicImage,
    width: u32,
    height: u32,
    gravity: Gravity,
    background: Rgba<u8>,
) -> DynamicImage {
    let fitted = img.resize(width, height, FILTER).to_rgba8();
    let mut canvas = RgbaImage::from_pixel(width, height, background);
    let (x, y) = gravity.anchor((width, height), fitted.dimensions());
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
    DynamicImage::ImageRgba8(canvas)
}

fn adjust_gamma(img: DynamicImage, gamma: f32) -> DynamicImage {
    if gamma <= 0.0 {
        return img;
    }
    let exponent = 1.0 / gamma;
    let lut: Vec<u8> = (0..=255u32)
        .map(|v| ((v as f32 / 255.0).powf(exponent) * 255.0).round() as u8)
        .collect();

    let mut buf = img.to_rgba8();
    for pixel in buf.pixels_mut() {
        for c in 0..3 {
            pixel[c] = lut[pixel[c] as usize];
        }
    }
    DynamicImage::ImageRgba8(buf)
}

fn modulate(img: DynamicImage, brightness: u16, saturation: u16, hue: u16) -> DynamicImage {
    let img = if hue != 100 {
        img.huerotate((i32::from(hue) - 100) * 180 / 100)
    } else {
        img
    };

    let b = f32::from(brightness) / 100.0;
    let s = f32::from(saturation) / 100.0;

    let mut buf = img.to_rgba8();
    for pixel in buf.pixels_mut() {
        let [r, g, bl] = [pixel[0], pixel[1], pixel[2]].map(f32::from);
        let luma = 0.299 * r + 0.587 * g + 0.114 * bl;
        for c in 0..3 {
            let v = f32::from(pixel[c]);
            let v = (luma + (v - luma) * s) * b;
            pixel[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(buf)
}

fn composite(
    img: DynamicImage,
    src: &Path,
    gravity: Gravity,
    offset: (i32, i32),
) -> Result<DynamicImage, EngineError> {
    let overlay = decode(src)?.to_rgba8();
    let mut base = img.to_rgba8();

    let (ax, ay) = gravity.anchor(base.dimensions(), overlay.dimensions());
    // Offsets push away from the anchored edge, as GraphicsMagick does.
    let dx = match gravity {
        Gravity::NorthEast | Gravity::East | Gravity::SouthEast => -offset.0,
        _ => offset.0,
    };
    let dy = match gravity {
        Gravity::SouthWest | Gravity::South | Gravity::SouthEast => -offset.1,
        _ => offset.1,
    };

    imageops::overlay(
        &mut base,
        &overlay,
        i64::from(ax) + i64::from(dx),
        i64::from(ay) + i64::from(dy),
    );
    Ok(DynamicImage::ImageRgba8(base))
}

fn encode(img: &DynamicImage, pipeline: &Pipeline, output: &Path) -> Result<(), EngineError> {
    let format = ImageFormat::from_extension(&pipeline.format)
        .ok_or_else(|| EngineError::UnsupportedFormat(pipeline.format.clone()))?;

    let mut writer = BufWriter::new(File::create(output)?);
    match format {
        ImageFormat::Jpeg => {
            let quality = pipeline.quality().unwrap_or(80).clamp(1, 100);
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode_image(&img.to_rgb8())?;
        }
        other => img.write_to(&mut writer, other)?,
    }
    writer.flush()?;
    Ok(())
}

/// Parse a colour name or `#rgb` / `#rrggbb` / `#rrggbbaa` hex value
pub fn parse_color(value: &str) -> Result<Rgba<u8>, EngineError> {
    let value = value.trim();
    let named = match value.to_ascii_lowercase().as_str() {
        "white" => Some([255, 255, 255, 255]),
        "black" => Some([0, 0, 0, 255]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "gray" | "grey" => Some([128, 128, 128, 255]),
        "transparent" | "none" => Some([0, 0, 0, 0]),
        _ => None,
    };
    if let Some(rgba) = named {
        return Ok(Rgba(rgba));
    }

    let invalid = || EngineError::InvalidColor(value.to_string());
    let hex = value.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                out[i] = v * 17;
            }
            Ok(Rgba(out))
        }
        6 | 8 => {
            let mut out = [255u8; 4];
            for i in 0..hex.len() / 2 {
                out[i] = channel(&hex[i * 2..i * 2 + 2])?;
            }
            Ok(Rgba(out))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join(name);
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        img.save(&path).unwrap();
        path
    }

    fn pipeline(operations: Vec<Operation>, format: &str) -> Pipeline {
        Pipeline {
            operations,
            format: format.to_string(),
        }
    }

    #[test]
    fn cover_size_math() {
        assert_eq!(cover_size((400, 300), (200, 200)), (267, 200));
        assert_eq!(cover_size((300, 600), (200, 200)), (200, 400));
        assert_eq!(cover_size((100, 100), (200, 200)), (200, 200));
    }

    #[tokio::test]
    async fn recrop_produces_exact_box() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "src.png", 400, 300);
        let output = dir.path().join("out.jpg");

        let ops = vec![
            Operation::ResizeToCover {
                width: 200,
                height: 200,
                gravity: Gravity::Center,
                x: 0,
                y: 0,
            },
            Operation::Quality(80),
        ];
        RasterEngine
            .render(&source, &pipeline(ops, "jpg"), &output)
            .await
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 200));
    }

    #[tokio::test]
    async fn fill_pads_to_box() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "src.png", 400, 100);
        let output = dir.path().join("out.png");

        let ops = vec![Operation::ResizeAndPad {
            width: 200,
            height: 200,
            gravity: Gravity::Center,
            background: "#ff0000".into(),
        }];
        RasterEngine
            .render(&source, &pipeline(ops, "png"), &output)
            .await
            .unwrap();

        let out = image::open(&output).unwrap();
        assert_eq!(out.dimensions(), (200, 200));
        assert_eq!(out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn resize_fits_within_box() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "src.png", 400, 100);
        let output = dir.path().join("out.png");

        let ops = vec![Operation::ResizeToFit {
            width: 200,
            height: 200,
            flags: None,
        }];
        RasterEngine
            .render(&source, &pipeline(ops, "png"), &output)
            .await
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 50));
    }

    #[tokio::test]
    async fn shrink_only_flag_keeps_small_images() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "src.png", 50, 40);
        let output = dir.path().join("out.png");

        let ops = vec![Operation::ResizeToFit {
            width: 200,
            height: 200,
            flags: Some(">".into()),
        }];
        RasterEngine
            .render(&source, &pipeline(ops, "png"), &output)
            .await
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (50, 40));
    }

    #[tokio::test]
    async fn unsupported_format_fails() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "src.png", 10, 10);
        let output = dir.path().join("out.eps");

        let err = RasterEngine
            .render(&source, &pipeline(vec![], "eps"), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(ref f) if f == "eps"));
    }

    #[tokio::test]
    async fn missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = RasterEngine
            .render(
                &dir.path().join("nope.png"),
                &pipeline(vec![], "png"),
                &dir.path().join("out.png"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[tokio::test]
    async fn source_without_extension_decodes() {
        let dir = TempDir::new().unwrap();
        let written = write_source(&dir, "upload.png", 40, 20);
        let source = dir.path().join("upload");
        std::fs::rename(&written, &source).unwrap();
        let output = dir.path().join("out.png");

        let ops = vec![Operation::ResizeToFit {
            width: 20,
            height: 20,
            flags: None,
        }];
        RasterEngine
            .render(&source, &pipeline(ops, "png"), &output)
            .await
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (20, 10));
    }

    #[test]
    fn parse_color_forms() {
        assert_eq!(parse_color("white").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_color("#000").unwrap(), Rgba([0, 0, 0, 255]));
        assert_eq!(parse_color("#10203040").unwrap(), Rgba([16, 32, 48, 64]));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn gamma_one_is_identity() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([10, 128, 250, 255])));
        let out = adjust_gamma(img, 1.0);
        assert_eq!(out.get_pixel(0, 0), Rgba([10, 128, 250, 255]));
    }
}
