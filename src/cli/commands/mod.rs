//! CLI command implementations

pub mod config;
pub mod invalidate;
pub mod purge;
pub mod request;
pub mod resolve;
pub mod status;
pub mod urls;

pub use config::execute as config;
pub use invalidate::execute as invalidate;
pub use purge::execute as purge;
pub use request::execute as request;
pub use resolve::execute as resolve;
pub use status::execute as status;
pub use urls::execute as urls;

use crate::config::Config;
use crate::error::DerivoResult;
use crate::http::ImageService;
use crate::source::CatalogSourceStore;
use std::sync::Arc;

/// Build the image service over the configured source catalogue
pub(crate) async fn service(config: &Config) -> DerivoResult<ImageService> {
    let sources = CatalogSourceStore::load(&config.catalog_path()).await?;
    ImageService::from_config(config, Arc::new(sources)).await
}
