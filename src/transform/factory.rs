//! Engine factory
//!
//! Instantiates the engine selected by `[engine].kind`.

use crate::config::{Config, EngineKind};
use crate::transform::engine::TransformEngine;
use crate::transform::graphicsmagick::GraphicsMagickEngine;
use crate::transform::raster::RasterEngine;
use std::sync::Arc;
use tracing::debug;

/// Create the transform engine configured for this process
pub fn create_engine(config: &Config) -> Arc<dyn TransformEngine> {
    let engine: Arc<dyn TransformEngine> = match config.engine.kind {
        EngineKind::Raster => Arc::new(RasterEngine::new()),
        EngineKind::GraphicsMagick => {
            Arc::new(GraphicsMagickEngine::new(config.engine.gm_binary.clone()))
        }
    };
    debug!("Using {} transform engine", engine.engine_name());
    engine
}
