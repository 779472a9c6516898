//! Derivative naming
//!
//! The single source of truth for where a derivative lives and how it is
//! addressed publicly. Both the resolver (writes) and the invalidation
//! manager (deletes) go through [`PathResolver`], so the two can never
//! disagree about a file name.

use crate::config::Config;
use crate::error::DerivoResult;
use crate::package::{validate_component, PackageRegistry};
use crate::source::SourceImage;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A requested derivative: source id, package name and requested extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub source_id: String,
    pub package: String,
    pub extension: String,
}

impl DerivativeKey {
    pub fn new(
        source_id: impl Into<String>,
        package: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            package: package.into(),
            extension: extension.into(),
        }
    }
}

impl fmt::Display for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.source_id, self.package, self.extension)
    }
}

/// Maps derivative keys to cache paths and public URLs
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<PackageRegistry>,
    images_dir: PathBuf,
    domain: String,
    image_route: String,
}

impl PathResolver {
    pub fn new(
        registry: Arc<PackageRegistry>,
        images_dir: impl Into<PathBuf>,
        domain: impl Into<String>,
        image_route: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            images_dir: images_dir.into(),
            domain: domain.into(),
            image_route: image_route.into(),
        }
    }

    /// Build from the server section of a loaded config
    pub fn from_config(config: &Config, registry: Arc<PackageRegistry>) -> Self {
        Self::new(
            registry,
            config.images_dir(),
            config.server.domain.clone(),
            config.server.image_route.clone(),
        )
    }

    /// Root directory of the derivative cache
    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Route prefix used in URLs
    pub fn image_route(&self) -> &str {
        &self.image_route
    }

    /// File name of the derivative actually produced for `key`
    ///
    /// Applies the package's `force_type` and rejects components that
    /// would make the name ambiguous.
    pub fn file_name(&self, key: &DerivativeKey) -> DerivoResult<String> {
        let package = self.registry.resolve(&key.package)?;
        validate_component(&key.source_id)?;

        let extension = package.output_extension(&key.extension);
        validate_component(extension)?;

        Ok(format!("{}-{}.{}", key.source_id, key.package, extension))
    }

    /// Absolute cache path for `key`
    pub fn path_for(&self, key: &DerivativeKey) -> DerivoResult<PathBuf> {
        Ok(self.images_dir.join(self.file_name(key)?))
    }

    /// Public URL for `key`
    pub fn url_for(&self, key: &DerivativeKey) -> DerivoResult<String> {
        Ok(format!(
            "{}{}{}",
            self.domain,
            self.image_route,
            self.file_name(key)?
        ))
    }

    /// Cache path of every package for a source record, keyed by package
    pub fn paths_for(&self, source: &SourceImage) -> DerivoResult<BTreeMap<String, PathBuf>> {
        self.registry
            .iter()
            .map(|(name, _)| {
                let key = DerivativeKey::new(&source.id, name, &source.extension);
                Ok((name.to_string(), self.path_for(&key)?))
            })
            .collect()
    }

    /// Public URL of every package for a source record, keyed by package
    pub fn urls_for(&self, source: &SourceImage) -> DerivoResult<BTreeMap<String, String>> {
        self.registry
            .iter()
            .map(|(name, _)| {
                let key = DerivativeKey::new(&source.id, name, &source.extension);
                Ok((name.to_string(), self.url_for(&key)?))
            })
            .collect()
    }
}
