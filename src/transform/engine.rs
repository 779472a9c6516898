//! Pixel-transform engine abstraction
//!
//! Provides a trait for rendering a [`Pipeline`] that can be implemented
//! by different backends (in-process raster, GraphicsMagick subprocess).

use crate::transform::pipeline::Pipeline;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Failures reported by an engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with code {code}: {stderr}")]
    Command {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid colour: {0}")]
    InvalidColor(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine task failed: {0}")]
    Task(String),
}

/// Abstract pixel-transform engine
///
/// `render` must write a complete file at `output` or fail; callers write
/// to a temporary name and rename on success.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Check whether the engine can run on this system
    async fn is_available(&self) -> bool;

    /// Apply `pipeline` to `source`, writing the result to `output`
    async fn render(
        &self,
        source: &Path,
        pipeline: &Pipeline,
        output: &Path,
    ) -> Result<(), EngineError>;

    /// Human-readable engine name for display
    fn engine_name(&self) -> &'static str;
}
