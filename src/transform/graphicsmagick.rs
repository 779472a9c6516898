//! GraphicsMagick engine
//!
//! Translates a pipeline into a single `gm convert` invocation.

use crate::transform::engine::{EngineError, TransformEngine};
use crate::transform::pipeline::{Operation, Pipeline};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Engine that shells out to `gm convert`
#[derive(Debug, Clone)]
pub struct GraphicsMagickEngine {
    binary: String,
}

impl GraphicsMagickEngine {
    /// Create an engine using the given `gm` executable
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments after `convert` for one render
    pub fn convert_args(source: &Path, pipeline: &Pipeline, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![source.as_os_str().to_owned()];
        let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));

        for op in &pipeline.operations {
            match op {
                Operation::ResizeToFit {
                    width,
                    height,
                    flags,
                } => {
                    let flags = flags.as_deref().unwrap_or("");
                    let geometry = format!("{}x{}{}", width, height, flags);
                    push(&["-resize", geometry.as_str()]);
                }
                Operation::ResizeToCover {
                    width,
                    height,
                    gravity,
                    x,
                    y,
                } => {
                    let cover = format!("{}x{}^", width, height);
                    let crop = format!("{}x{}{:+}{:+}", width, height, x, y);
                    push(&[
                        "-resize",
                        cover.as_str(),
                        "-gravity",
                        gravity.as_str(),
                        "-crop",
                        crop.as_str(),
                    ]);
                }
                Operation::ResizeAndPad {
                    width,
                    height,
                    gravity,
                    background,
                } => {
                    let size = format!("{}x{}", width, height);
                    push(&[
                        "-resize",
                        size.as_str(),
                        "-background",
                        background.as_str(),
                        "-gravity",
                        gravity.as_str(),
                        "-extent",
                        size.as_str(),
                    ]);
                }
                Operation::Quality(quality) => {
                    push(&["-quality", quality.to_string().as_str()]);
                }
                Operation::Progressive { sampling_factor } => {
                    push(&["-interlace", "Line", "-sampling-factor", sampling_factor.as_str()]);
                }
                Operation::Gamma(gamma) => {
                    push(&["-gamma", gamma.to_string().as_str()]);
                }
                Operation::Modulate {
                    brightness,
                    saturation,
                    hue,
                } => {
                    let value = format!("{},{},{}", brightness, saturation, hue);
                    push(&["-modulate", value.as_str()]);
                }
                Operation::DrawText {
                    text,
                    color,
                    size,
                    gravity,
                    font,
                    offset,
                } => {
                    if let Some(font) = font {
                        push(&["-font", font.as_str()]);
                    }
                    let draw = format!(
                        "text {},{} '{}'",
                        offset.0,
                        offset.1,
                        text.replace('\'', "\\'")
                    );
                    push(&[
                        "-fill",
                        color.as_str(),
                        "-pointsize",
                        size.to_string().as_str(),
                        "-gravity",
                        gravity.as_str(),
                        "-draw",
                        draw.as_str(),
                    ]);
                }
                Operation::Composite {
                    src,
                    gravity,
                    offset,
                } => {
                    let draw = format!(
                        "image Over {},{} 0,0 '{}'",
                        offset.0,
                        offset.1,
                        src.display()
                    );
                    push(&["-gravity", gravity.as_str(), "-draw", draw.as_str()]);
                }
            }
        }

        // Explicit format prefix: the output is a temporary name.
        let mut target = OsString::from(format!("{}:", pipeline.format.to_ascii_uppercase()));
        target.push(output.as_os_str());
        args.push(target);
        args
    }
}

impl Default for GraphicsMagickEngine {
    fn default() -> Self {
        Self::new("gm")
    }
}

#[async_trait]
impl TransformEngine for GraphicsMagickEngine {
    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn render(
        &self,
        source: &Path,
        pipeline: &Pipeline,
        output: &Path,
    ) -> Result<(), EngineError> {
        let args = Self::convert_args(source, pipeline, output);
        debug!("Executing: {} convert {:?}", self.binary, args);

        let result = Command::new(&self.binary)
            .arg("convert")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| EngineError::Spawn {
                command: format!("{} convert", self.binary),
                source: e,
            })?;

        if result.status.success() {
            Ok(())
        } else {
            Err(EngineError::Command {
                command: format!("{} convert", self.binary),
                code: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }

    fn engine_name(&self) -> &'static str {
        "graphicsmagick"
    }
}
