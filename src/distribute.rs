//! Best-effort replication of generated derivatives
//!
//! After a successful generation the resolver hands the cache path to a
//! [`Distributor`] on a detached task. Failures come back as
//! `DistributionFailed`, are logged by the caller, and never reach the
//! request that triggered generation.

use crate::config::{Config, DistributionKind};
use crate::error::{DerivoError, DerivoResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Replicates a file to other nodes
#[async_trait]
pub trait Distributor: Send + Sync {
    /// Replicate the file at `from` so it appears at `to` on every target
    async fn distribute(&self, from: &Path, to: &Path) -> DerivoResult<()>;
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDistributor;

#[async_trait]
impl Distributor for NoopDistributor {
    async fn distribute(&self, _from: &Path, _to: &Path) -> DerivoResult<()> {
        Ok(())
    }
}

fn relative_to<'a>(root: &Path, path: &'a Path) -> DerivoResult<&'a Path> {
    path.strip_prefix(root)
        .map_err(|_| DerivoError::DistributionFailed {
            path: path.to_path_buf(),
            reason: format!("not under root {}", root.display()),
        })
}

/// Copies files into mirror roots that share the server layout
#[derive(Debug, Clone)]
pub struct MirrorDistributor {
    root: PathBuf,
    mirrors: Vec<PathBuf>,
}

impl MirrorDistributor {
    pub fn new(root: impl Into<PathBuf>, mirrors: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mirrors,
        }
    }
}

#[async_trait]
impl Distributor for MirrorDistributor {
    async fn distribute(&self, from: &Path, to: &Path) -> DerivoResult<()> {
        let relative = relative_to(&self.root, to)?;
        let mut failures = Vec::new();

        for mirror in &self.mirrors {
            let target = mirror.join(relative);
            let copy = async {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(from, &target).await
            };
            match copy.await {
                Ok(bytes) => debug!("Mirrored {} bytes to {}", bytes, target.display()),
                Err(e) => failures.push(format!("{}: {}", target.display(), e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DerivoError::DistributionFailed {
                path: from.to_path_buf(),
                reason: failures.join("; "),
            })
        }
    }
}

/// PUTs files to peer nodes under the same relative path
#[derive(Debug, Clone)]
pub struct HttpDistributor {
    root: PathBuf,
    peers: Vec<String>,
}

impl HttpDistributor {
    pub fn new(root: impl Into<PathBuf>, peers: Vec<String>) -> Self {
        Self {
            root: root.into(),
            peers,
        }
    }

    /// Target URL on one peer
    pub fn url_for(peer: &str, relative: &Path) -> String {
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("{}/{}", peer.trim_end_matches('/'), relative.join("/"))
    }
}

#[async_trait]
impl Distributor for HttpDistributor {
    async fn distribute(&self, from: &Path, to: &Path) -> DerivoResult<()> {
        let relative = relative_to(&self.root, to)?;
        let bytes = tokio::fs::read(from)
            .await
            .map_err(|e| DerivoError::io(format!("reading {}", from.display()), e))?;

        let urls: Vec<String> = self
            .peers
            .iter()
            .map(|peer| Self::url_for(peer, relative))
            .collect();

        let failures = tokio::task::spawn_blocking(move || {
            let mut failures = Vec::new();
            for url in &urls {
                match ureq::put(url).send(&bytes[..]) {
                    Ok(_) => debug!("Distributed to {}", url),
                    Err(e) => failures.push(format!("{}: {}", url, e)),
                }
            }
            failures
        })
        .await
        .map_err(|e| DerivoError::Internal(format!("distribution task failed: {}", e)))?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DerivoError::DistributionFailed {
                path: from.to_path_buf(),
                reason: failures.join("; "),
            })
        }
    }
}

/// Create the distributor configured for this process
pub fn create_distributor(config: &Config) -> Arc<dyn Distributor> {
    let root = config.server.root_path.clone();
    match config.distribution.kind {
        DistributionKind::None => Arc::new(NoopDistributor),
        DistributionKind::Mirror => Arc::new(MirrorDistributor::new(
            root,
            config
                .distribution
                .targets
                .iter()
                .map(PathBuf::from)
                .collect(),
        )),
        DistributionKind::Http => Arc::new(HttpDistributor::new(
            root,
            config.distribution.targets.clone(),
        )),
    }
}
