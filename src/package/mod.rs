//! Named transform packages
//!
//! Packages are loaded once from configuration, validated, and then shared
//! read-only by the resolver, the path resolver and the purge manager.

pub mod model;
pub mod registry;

pub use model::{
    Gravity, ImageWatermark, PackageConfig, PackageKind, TextWatermark, Watermark,
};
pub use registry::{validate_component, PackageRegistry, RESERVED_CHARS};
