//! Configuration schema for Derivo
//!
//! Configuration is stored at `~/.config/derivo/config.toml`

use crate::package::PackageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Paths, URLs and accepted extensions
    pub server: ServerConfig,

    /// Pixel-transform engine selection
    pub engine: EngineConfig,

    /// Replication of generated derivatives
    pub distribution: DistributionConfig,

    /// Source record catalogue used by the CLI
    pub sources: SourcesConfig,

    /// Named transform packages
    pub packages: BTreeMap<String, PackageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut packages = BTreeMap::new();
        packages.insert("thumb".to_string(), PackageConfig::thumb());

        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            distribution: DistributionConfig::default(),
            sources: SourcesConfig::default(),
            packages,
        }
    }
}

impl Config {
    /// Absolute directory holding cached derivatives
    pub fn images_dir(&self) -> PathBuf {
        self.server.root_path.join(&self.server.images_dir)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.server.root_path.join(&self.sources.catalog)
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append generation/invalidation events to the audit log
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: false,
        }
    }
}

/// Server paths and request surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root that source file paths and `images_dir` are relative to
    pub root_path: PathBuf,

    /// Cache directory, relative to `root_path`
    pub images_dir: PathBuf,

    /// Public domain prefix for derivative URLs
    pub domain: String,

    /// Route prefix for derivative URLs, with surrounding slashes
    pub image_route: String,

    /// Extensions a client may request
    pub extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            images_dir: PathBuf::from("data/images"),
            domain: "//localhost:13337".to_string(),
            image_route: "/image/".to_string(),
            extensions: ["png", "jpg", "jpeg", "bmp", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Available transform engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process, pure Rust
    #[default]
    Raster,
    /// Spawns `gm convert`
    GraphicsMagick,
}

/// Transform engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which engine renders derivatives
    pub kind: EngineKind,

    /// GraphicsMagick executable
    pub gm_binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Raster,
            gm_binary: "gm".to_string(),
        }
    }
}

/// Distribution backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionKind {
    #[default]
    None,
    /// Copy into local mirror roots
    Mirror,
    /// PUT to peer base URLs
    Http,
}

/// Distribution settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    pub kind: DistributionKind,

    /// Mirror directories or peer base URLs, depending on `kind`
    pub targets: Vec<String>,
}

/// Source catalogue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// JSON array of source records, relative to `root_path`
    pub catalog: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("sources.json"),
        }
    }
}
