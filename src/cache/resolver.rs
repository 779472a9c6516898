//! Cache resolution and generation coordination
//!
//! [`CacheResolver::resolve`] is the only writer of derivative files. A
//! request either hits an existing file, joins a generation that is already
//! in flight for the same target, or starts one.
//!
//! Generations run on their own task and publish their outcome through a
//! shared future, so a requester that goes away does not cancel the work
//! and every waiter sees the same result. Engines render into a sibling
//! `*.part` file that is renamed into place, so the cache path only ever
//! holds complete files.

use crate::audit::{events, AuditLog};
use crate::cache::path::{DerivativeKey, PathResolver};
use crate::config::Config;
use crate::distribute::Distributor;
use crate::error::{DerivoError, DerivoResult};
use crate::package::{PackageConfig, PackageRegistry};
use crate::source::{SourceImage, SourceStore};
use crate::transform::{PipelineBuilder, TransformEngine};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome shared by every waiter of one generation
type FlightResult = Result<PathBuf, Arc<DerivoError>>;
type Flight = Shared<BoxFuture<'static, FlightResult>>;

/// Suffix of in-progress renders
pub const PARTIAL_SUFFIX: &str = "part";

/// Everything one generation needs, owned so it can move onto a task
struct GenerationJob {
    package_name: String,
    package: PackageConfig,
    source: SourceImage,
    source_path: PathBuf,
    target: PathBuf,
    format: String,
}

/// Removes the in-flight entry when the generation task ends, even on panic
struct FlightGuard {
    flights: Arc<DashMap<PathBuf, Flight>>,
    target: PathBuf,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights.remove(&self.target);
    }
}

/// Serves derivatives from cache and generates missing ones
#[derive(Clone)]
pub struct CacheResolver {
    registry: Arc<PackageRegistry>,
    paths: PathResolver,
    builder: PipelineBuilder,
    extensions: Arc<[String]>,
    root: PathBuf,
    sources: Arc<dyn SourceStore>,
    engine: Arc<dyn TransformEngine>,
    distributor: Arc<dyn Distributor>,
    audit: AuditLog,
    flights: Arc<DashMap<PathBuf, Flight>>,
}

impl CacheResolver {
    /// Create a resolver for a loaded config and its validated registry
    pub fn new(
        config: &Config,
        registry: Arc<PackageRegistry>,
        sources: Arc<dyn SourceStore>,
        engine: Arc<dyn TransformEngine>,
        distributor: Arc<dyn Distributor>,
    ) -> Self {
        Self {
            paths: PathResolver::from_config(config, Arc::clone(&registry)),
            registry,
            builder: PipelineBuilder::new(&config.server.root_path),
            extensions: config.server.extensions.clone().into(),
            root: config.server.root_path.clone(),
            sources,
            engine,
            distributor,
            audit: AuditLog::disabled(),
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Record generations in an audit log
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    /// Path resolver shared with the rest of the core
    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// The package registry this resolver serves
    pub fn registry(&self) -> &Arc<PackageRegistry> {
        &self.registry
    }

    /// Engine used for generation
    pub fn engine(&self) -> &Arc<dyn TransformEngine> {
        &self.engine
    }

    /// Whether clients may request this extension
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }

    /// Number of generations currently running
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Resolve a derivative to a complete file on disk
    ///
    /// With `force`, an existing file is ignored and regenerated. A request
    /// that arrives while a generation for the same target is running waits
    /// for that generation instead of starting its own.
    pub async fn resolve(&self, key: &DerivativeKey, force: bool) -> DerivoResult<PathBuf> {
        let package = self.registry.resolve(&key.package)?;

        if !self.supports_extension(&key.extension) {
            return Err(DerivoError::UnsupportedExtension(key.extension.clone()));
        }

        let target = self.paths.path_for(key)?;

        let source = self
            .sources
            .find(&key.source_id)
            .await?
            .ok_or_else(|| DerivoError::SourceNotFound(key.source_id.clone()))?;

        let source_path = source.path_under(&self.root);
        tokio::fs::File::open(&source_path)
            .await
            .map_err(|e| DerivoError::SourceUnavailable {
                path: source_path.clone(),
                source: e,
            })?;

        if !force && is_readable_file(&target).await {
            debug!("Cache hit: {}", target.display());
            return Ok(target);
        }

        let job = GenerationJob {
            package_name: key.package.clone(),
            format: package.output_extension(&key.extension).to_string(),
            package: package.clone(),
            source,
            source_path,
            target,
        };

        self.join_or_start(job).await
    }

    async fn join_or_start(&self, job: GenerationJob) -> DerivoResult<PathBuf> {
        let flight = match self.flights.entry(job.target.clone()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight generation of {}", job.target.display());
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let flight = self.start_flight(job);
                entry.insert(flight.clone());
                flight
            }
        };

        flight.await.map_err(DerivoError::Shared)
    }

    fn start_flight(&self, job: GenerationJob) -> Flight {
        let this = self.clone();
        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            target: job.target.clone(),
        };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            this.generate(&job).await.map_err(Arc::new)
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(Arc::new(DerivoError::Internal(format!(
                    "generation task failed: {}",
                    e
                ))))
            })
        }
        .boxed()
        .shared()
    }

    async fn generate(&self, job: &GenerationJob) -> DerivoResult<PathBuf> {
        let pipeline =
            self.builder
                .build(&job.package_name, &job.package, &job.source, &job.format)?;

        if let Some(dir) = job.target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DerivoError::DirCreate {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
        }

        let partial = partial_path(&job.target);
        debug!(
            "Generating {} from {} via {}",
            job.target.display(),
            job.source_path.display(),
            self.engine.engine_name()
        );

        if let Err(source) = self
            .engine
            .render(&job.source_path, &pipeline, &partial)
            .await
        {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DerivoError::TransformFailed {
                target: job.target.clone(),
                source,
            });
        }

        tokio::fs::rename(&partial, &job.target)
            .await
            .map_err(|e| {
                DerivoError::io(format!("moving {} into place", job.target.display()), e)
            })?;

        info!("Generated {}", job.target.display());
        self.audit
            .log(
                events::GENERATED,
                &serde_json::json!({
                    "source": job.source.id,
                    "package": job.package_name,
                    "path": job.target.display().to_string(),
                }),
            )
            .await;

        self.notify_distribution(job.target.clone());
        Ok(job.target.clone())
    }

    fn notify_distribution(&self, path: PathBuf) {
        let distributor = Arc::clone(&self.distributor);
        tokio::spawn(async move {
            match distributor.distribute(&path, &path).await {
                Ok(()) => debug!("Distributed {}", path.display()),
                Err(e) => error!("Distribution of {} failed: {}", path.display(), e),
            }
        });
    }
}

/// Temporary sibling a generation renders into
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.{}", uuid::Uuid::new_v4().simple(), PARTIAL_SUFFIX));
    target.with_file_name(name)
}

async fn is_readable_file(path: &Path) -> bool {
    match tokio::fs::File::open(path).await {
        Ok(file) => file.metadata().await.map(|m| m.is_file()).unwrap_or(false),
        Err(_) => false,
    }
}
