//! Validated, read-only package registry

use crate::error::{DerivoError, DerivoResult};
use crate::package::model::PackageConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Characters that may never appear in a package name or source id.
///
/// `-` separates id and package in cache file names, `.` separates the
/// extension, and path separators would escape the cache root.
pub const RESERVED_CHARS: &[char] = &['-', '.', '/', '\\'];

/// Check that a cache file name component is usable verbatim
pub fn validate_component(value: &str) -> DerivoResult<()> {
    if value.is_empty() {
        return Err(DerivoError::invalid_key(value, "must not be empty"));
    }
    if let Some(c) = value.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(DerivoError::invalid_key(
            value,
            format!("contains reserved character {:?}", c),
        ));
    }
    Ok(())
}

/// Immutable set of named packages
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: BTreeMap<String, PackageConfig>,
}

impl PackageRegistry {
    /// Validate and freeze a set of package definitions
    ///
    /// `extensions` is the supported extension set; a `force_type` outside
    /// it would produce files the request surface can never serve.
    pub fn new(
        packages: BTreeMap<String, PackageConfig>,
        extensions: &[String],
    ) -> DerivoResult<Self> {
        for (name, package) in &packages {
            Self::validate(name, package, extensions)?;
        }

        debug!("Loaded {} package definitions", packages.len());
        Ok(Self { packages })
    }

    fn validate(name: &str, package: &PackageConfig, extensions: &[String]) -> DerivoResult<()> {
        let invalid = |reason: String| DerivoError::PackageInvalid {
            package: name.to_string(),
            reason,
        };

        validate_component(name).map_err(|e| invalid(e.to_string()))?;

        if package.kind.is_sizing() {
            if package.width.is_none() {
                return Err(invalid(format!("type {} requires width", package.kind)));
            }
            if package.height.is_none() {
                return Err(invalid(format!("type {} requires height", package.kind)));
            }
        }

        if package.quality > 100 {
            return Err(invalid(format!(
                "quality {} is outside 0-100",
                package.quality
            )));
        }

        if let Some(ref forced) = package.force_type {
            if !extensions.iter().any(|e| e == forced) {
                return Err(invalid(format!(
                    "forceType {} is not a supported extension",
                    forced
                )));
            }
        }

        Ok(())
    }

    /// Look up a package by name
    pub fn resolve(&self, name: &str) -> DerivoResult<&PackageConfig> {
        self.packages
            .get(name)
            .ok_or_else(|| DerivoError::UnknownPackage(name.to_string()))
    }

    /// Whether a package with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Iterate packages in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageConfig)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry has no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::model::PackageKind;

    fn exts() -> Vec<String> {
        ["png", "jpg", "jpeg", "bmp", "gif"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn registry_of(name: &str, package: PackageConfig) -> DerivoResult<PackageRegistry> {
        let mut packages = BTreeMap::new();
        packages.insert(name.to_string(), package);
        PackageRegistry::new(packages, &exts())
    }

    #[test]
    fn resolves_known_package() {
        let registry = registry_of("thumb", PackageConfig::thumb()).unwrap();
        assert_eq!(registry.resolve("thumb").unwrap().width, Some(200));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_package() {
        let registry = registry_of("thumb", PackageConfig::thumb()).unwrap();
        let err = registry.resolve("full").unwrap_err();
        assert!(matches!(err, DerivoError::UnknownPackage(ref n) if n == "full"));
    }

    #[test]
    fn sizing_type_requires_dimensions() {
        let mut pkg = PackageConfig::new(PackageKind::Fill);
        pkg.width = Some(100);
        let err = registry_of("banner", pkg).unwrap_err();
        assert!(err.to_string().contains("requires height"));
    }

    #[test]
    fn original_needs_no_dimensions() {
        assert!(registry_of("orig", PackageConfig::new(PackageKind::Original)).is_ok());
    }

    #[test]
    fn rejects_reserved_characters_in_name() {
        assert!(registry_of("big-thumb", PackageConfig::thumb()).is_err());
        assert!(registry_of("thumb.v2", PackageConfig::thumb()).is_err());
        assert!(registry_of("a/b", PackageConfig::thumb()).is_err());
    }

    #[test]
    fn rejects_unsupported_force_type() {
        let err = registry_of("thumb", PackageConfig::thumb().forcing("webp")).unwrap_err();
        assert!(err.to_string().contains("forceType webp"));
    }

    #[test]
    fn rejects_quality_above_hundred() {
        let mut pkg = PackageConfig::thumb();
        pkg.quality = 101;
        assert!(registry_of("thumb", pkg).is_err());
    }

    #[test]
    fn validate_component_rules() {
        assert!(validate_component("5a1b2c").is_ok());
        assert!(validate_component("").is_err());
        assert!(validate_component("a-b").is_err());
        assert!(validate_component("..").is_err());
    }
}
