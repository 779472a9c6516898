//! Configuration management for Derivo

pub mod schema;

pub use schema::{Config, DistributionKind, EngineKind};

use crate::error::{DerivoError, DerivoResult};
use crate::package::{PackageRegistry, Watermark};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("derivo")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("derivo")
    }

    /// Get the audit log path
    pub fn audit_log_path() -> PathBuf {
        Self::state_dir().join("audit.log")
    }

    /// Load configuration, falling back to defaults if the file is absent
    pub async fn load(&self) -> DerivoResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DerivoResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DerivoError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DerivoError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DerivoResult<()> {
        if let Some(parent) = self.config_path.parent() {
            Self::ensure_dir(parent).await?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DerivoError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Build the validated package registry for a loaded config
    pub fn registry(config: &Config) -> DerivoResult<PackageRegistry> {
        PackageRegistry::new(config.packages.clone(), &config.server.extensions)
    }

    /// Package features the configured engine will skip
    pub fn engine_warnings(config: &Config) -> Vec<String> {
        if config.engine.kind != EngineKind::Raster {
            return Vec::new();
        }

        config
            .packages
            .iter()
            .filter(|(_, pkg)| matches!(pkg.watermark, Some(Watermark::Text(_))))
            .map(|(name, _)| {
                format!("package {name} has a text watermark the raster engine does not draw")
            })
            .collect()
    }

    /// Create the derivative cache directory if absent
    pub async fn ensure_images_dir(config: &Config) -> DerivoResult<PathBuf> {
        let dir = config.images_dir();
        Self::ensure_dir(&dir).await?;
        debug!("Images directory ready: {}", dir.display());
        Ok(dir)
    }

    async fn ensure_dir(dir: &Path) -> DerivoResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| DerivoError::DirCreate {
                path: dir.to_path_buf(),
                source: e,
            })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
