//! Transform pipelines and the engines that render them
//!
//! - [`pipeline`]: package → ordered primitive operations
//! - [`engine`]: the [`TransformEngine`] trait
//! - [`raster`]: in-process engine on the `image` crate
//! - [`graphicsmagick`]: `gm convert` subprocess engine

pub mod engine;
mod factory;
pub mod graphicsmagick;
pub mod pipeline;
pub mod raster;

pub use engine::{EngineError, TransformEngine};
pub use factory::create_engine;
pub use graphicsmagick::GraphicsMagickEngine;
pub use pipeline::{Operation, Pipeline, PipelineBuilder};
pub use raster::RasterEngine;
