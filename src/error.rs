//! Error types for Derivo
//!
//! All modules use `DerivoResult<T>` as their return type.

use crate::transform::EngineError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for Derivo operations
pub type DerivoResult<T> = Result<T, DerivoError>;

/// All errors that can occur in Derivo
#[derive(Error, Debug)]
pub enum DerivoError {
    // Request errors
    #[error("pkg definition missing for {0}")]
    UnknownPackage(String),

    #[error("invalid extension {0}")]
    UnsupportedExtension(String),

    #[error("Invalid derivative key component {value:?}: {reason}")]
    InvalidKey { value: String, reason: String },

    // Source errors
    #[error("Source image not found: {0}")]
    SourceNotFound(String),

    #[error("Source file unavailable: {path}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generation errors
    #[error("Package {package} is misconfigured: {reason}")]
    ConfigurationError { package: String, reason: String },

    #[error("Transform failed for {target}: {source}")]
    TransformFailed {
        target: PathBuf,
        #[source]
        source: EngineError,
    },

    #[error("Distribution of {path} failed: {reason}")]
    DistributionFailed { path: PathBuf, reason: String },

    /// Outcome of a generation shared with every waiter on the same key
    #[error(transparent)]
    Shared(Arc<DerivoError>),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid package definition {package}: {reason}")]
    PackageInvalid { package: String, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    DirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl DerivoError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error for a package
    pub fn configuration(package: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            package: package.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Unwrap a shared single-flight error down to the original variant
    pub fn root(&self) -> &DerivoError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// HTTP status code this error maps to at the request surface
    pub fn status(&self) -> u16 {
        match self.root() {
            Self::UnknownPackage(_) | Self::UnsupportedExtension(_) | Self::InvalidKey { .. } => {
                400
            }
            Self::SourceNotFound(_) => 404,
            _ => 500,
        }
    }

    /// Response body for the request surface
    pub fn body(&self) -> String {
        match self.root() {
            Self::UnknownPackage(_) | Self::UnsupportedExtension(_) | Self::InvalidKey { .. } => {
                self.root().to_string()
            }
            Self::SourceNotFound(_) => String::new(),
            Self::SourceUnavailable { .. } => "File is missing!".to_string(),
            Self::TransformFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::UnknownPackage(_) => {
                Some("Run: derivo config show (lists configured packages)")
            }
            Self::UnsupportedExtension(_) => Some("Add the extension to [server].extensions"),
            Self::SourceUnavailable { .. } => {
                Some("Check [server].root_path and the record's filepath")
            }
            Self::TransformFailed { .. } => {
                Some("Run: derivo status (checks the transform engine)")
            }
            _ => None,
        }
    }
}
