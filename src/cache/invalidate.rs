//! Invalidation and purge
//!
//! Invalidation removes every derivative of one source after it changes.
//! Purge removes every derivative of one package after its configuration
//! changes. Both are best-effort: a file that cannot be removed is logged
//! and skipped, and the next request regenerates whatever is missing.

use crate::audit::{events, AuditLog};
use crate::cache::path::{DerivativeKey, PathResolver};
use crate::cache::resolver::PARTIAL_SUFFIX;
use crate::config::Config;
use crate::error::DerivoResult;
use crate::package::PackageRegistry;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Outcome of one package purge
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub package: String,
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Hooks the hosting application calls around source record changes
#[async_trait]
pub trait SourceLifecycle: Send + Sync {
    /// Drop every derivative of the source
    async fn on_source_changed(&self, source_id: &str);

    async fn before_save(&self, source_id: &str) {
        self.on_source_changed(source_id).await
    }

    async fn after_save(&self, source_id: &str) {
        self.on_source_changed(source_id).await
    }

    async fn before_remove(&self, source_id: &str) {
        self.on_source_changed(source_id).await
    }
}

/// Deletes derivatives by source or by package
#[derive(Clone)]
pub struct Invalidator {
    registry: Arc<PackageRegistry>,
    paths: PathResolver,
    extensions: Arc<[String]>,
    audit: AuditLog,
}

impl Invalidator {
    pub fn new(config: &Config, registry: Arc<PackageRegistry>) -> Self {
        Self {
            paths: PathResolver::from_config(config, Arc::clone(&registry)),
            registry,
            extensions: config.server.extensions.clone().into(),
            audit: AuditLog::disabled(),
        }
    }

    /// Record invalidations and purges in an audit log
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Every path a derivative of `source_id` may occupy
    ///
    /// Packages with a forced type have one candidate; the rest have one per
    /// supported extension, since any of them may have been requested.
    pub fn candidate_paths(&self, source_id: &str) -> DerivoResult<BTreeSet<PathBuf>> {
        let mut paths = BTreeSet::new();

        for (name, package) in self.registry.iter() {
            let extensions: Vec<&str> = match package.force_type.as_deref() {
                Some(forced) => vec![forced],
                None => self.extensions.iter().map(String::as_str).collect(),
            };

            for extension in extensions {
                let key = DerivativeKey::new(source_id, name, extension);
                paths.insert(self.paths.path_for(&key)?);
            }
        }

        Ok(paths)
    }

    /// Remove all derivatives of one source, returning how many existed
    pub async fn invalidate(&self, source_id: &str) -> DerivoResult<usize> {
        let candidates = self.candidate_paths(source_id)?;

        let outcomes =
            futures_util::future::join_all(candidates.iter().map(|p| remove_if_present(p))).await;
        let removed = outcomes.into_iter().filter(|removed| *removed).count();

        info!("Invalidated {} derivative(s) of {}", removed, source_id);
        self.audit
            .log(
                events::INVALIDATED,
                &serde_json::json!({ "source": source_id, "removed": removed }),
            )
            .await;

        Ok(removed)
    }

    /// Start deleting every derivative of `package` in the background
    ///
    /// The returned handle resolves once the scan finishes; callers that
    /// do not need the report may drop it.
    pub fn purge_package(&self, package: &str) -> JoinHandle<PurgeReport> {
        let dir = self.paths.images_dir().to_path_buf();
        let package = package.to_string();
        let audit = self.audit.clone();

        tokio::spawn(async move {
            let name = package.clone();
            let report = match tokio::task::spawn_blocking(move || purge_dir(&dir, &name)).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Purge of {} failed: {}", package, e);
                    PurgeReport {
                        package: package.clone(),
                        ..Default::default()
                    }
                }
            };

            info!(
                "Purged {} derivative(s) of package {} ({} failed)",
                report.deleted.len(),
                package,
                report.failed.len()
            );
            audit
                .log(
                    events::PURGED,
                    &serde_json::json!({
                        "package": package,
                        "deleted": report.deleted.len(),
                        "failed": report.failed.len(),
                    }),
                )
                .await;

            report
        })
    }
}

#[async_trait]
impl SourceLifecycle for Invalidator {
    async fn on_source_changed(&self, source_id: &str) {
        if let Err(e) = self.invalidate(source_id).await {
            warn!("Could not invalidate {}: {}", source_id, e);
        }
    }
}

/// File names belonging to a package: `{anything}-{package}.{anything}`
pub fn package_pattern(package: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(r"^.*?-{}\..*?$", regex::escape(package)))
        .case_insensitive(true)
        .build()
}

/// Delete matching files under `dir`, recording each outcome
pub fn purge_dir(dir: &Path, package: &str) -> PurgeReport {
    let mut report = PurgeReport {
        package: package.to_string(),
        ..Default::default()
    };

    let pattern = match package_pattern(package) {
        Ok(pattern) => pattern,
        Err(e) => {
            report.failed.push((dir.to_path_buf(), e.to_string()));
            return report;
        }
    };

    if !dir.exists() {
        debug!("Nothing to purge, {} does not exist", dir.display());
        return report;
    }

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                warn!("Skipping {}: {}", path.display(), e);
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.ends_with(&format!(".{}", PARTIAL_SUFFIX)) || !pattern.is_match(&name) {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Purged {}", entry.path().display());
                report.deleted.push(entry.path().to_path_buf());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Could not purge {}: {}", entry.path().display(), e);
                report.failed.push((entry.path().to_path_buf(), e.to_string()));
            }
        }
    }

    report
}

async fn remove_if_present(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}
