//! Request surface
//!
//! Maps image routes onto the cache core without binding to a server
//! framework. A host parses the method and request target, calls
//! [`ImageService::handle`], and writes the returned [`HttpResponse`].

use crate::audit::AuditLog;
use crate::cache::{CacheResolver, DerivativeKey, Invalidator};
use crate::config::{Config, ConfigManager};
use crate::distribute::create_distributor;
use crate::error::{DerivoError, DerivoResult};
use crate::source::SourceStore;
use crate::transform::create_engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};
use ureq::http::Uri;

/// A parsed `{id}-{package}.{ext}` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub key: DerivativeKey,
    pub purge: bool,
    pub no_cache: bool,
}

impl ImageRequest {
    /// Parse the part of the path after the image route plus the query
    ///
    /// Returns `None` when any of id, package or extension is missing.
    pub fn parse(file: &str, query: Option<&str>) -> Option<Self> {
        let (stem, extension) = file.rsplit_once('.')?;
        let (id, package) = stem.split_once('-')?;

        if id.is_empty() || package.is_empty() || extension.is_empty() {
            return None;
        }

        Some(Self {
            key: DerivativeKey::new(id, package, extension),
            purge: query_flag(query, "purge"),
            no_cache: query_flag(query, "noCache"),
        })
    }
}

/// Whether a query parameter is present with a value other than `""`, `0` or `false`
pub fn query_flag(query: Option<&str>, name: &str) -> bool {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
        .last()
        .is_some_and(|value| !matches!(value, "" | "0" | "false"))
}

/// Response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Stream this file
    File(PathBuf),
    Text(String),
    Empty,
}

/// Status and body for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn file(path: PathBuf) -> Self {
        Self {
            status: 200,
            body: ResponseBody::File(path),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: ResponseBody::Empty,
        }
    }

    pub fn not_found() -> Self {
        Self::empty(404)
    }

    /// Map a core error onto its status and body
    pub fn from_error(err: &DerivoError) -> Self {
        let status = err.status();
        if status >= 500 {
            error!("Request failed: {}", err);
        } else {
            debug!("Request rejected: {}", err);
        }

        let body = err.body();
        Self {
            status,
            body: if body.is_empty() {
                ResponseBody::Empty
            } else {
                ResponseBody::Text(body)
            },
        }
    }

    /// Content type for the body
    pub fn content_type(&self) -> &'static str {
        match &self.body {
            ResponseBody::File(path) => image::ImageFormat::from_path(path)
                .map(|f| f.to_mime_type())
                .unwrap_or("application/octet-stream"),
            ResponseBody::Text(_) => "text/plain; charset=utf-8",
            ResponseBody::Empty => "text/plain",
        }
    }
}

/// Image routes over one cache
#[derive(Clone)]
pub struct ImageService {
    resolver: CacheResolver,
    invalidator: Invalidator,
    sources: Arc<dyn SourceStore>,
}

impl ImageService {
    pub fn new(
        resolver: CacheResolver,
        invalidator: Invalidator,
        sources: Arc<dyn SourceStore>,
    ) -> Self {
        Self {
            resolver,
            invalidator,
            sources,
        }
    }

    /// Wire the configured engine, distributor and audit log around `sources`
    ///
    /// Creates the images directory if it does not exist.
    pub async fn from_config(config: &Config, sources: Arc<dyn SourceStore>) -> DerivoResult<Self> {
        let registry = Arc::new(ConfigManager::registry(config)?);
        ConfigManager::ensure_images_dir(config).await?;

        let audit = AuditLog::new(config);
        let resolver = CacheResolver::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&sources),
            create_engine(config),
            create_distributor(config),
        )
        .with_audit(audit.clone());
        let invalidator = Invalidator::new(config, registry).with_audit(audit);

        Ok(Self::new(resolver, invalidator, sources))
    }

    pub fn resolver(&self) -> &CacheResolver {
        &self.resolver
    }

    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    pub fn sources(&self) -> &Arc<dyn SourceStore> {
        &self.sources
    }

    /// Dispatch one request target such as `/image/abc-thumb.jpg?noCache=1`
    pub async fn handle(&self, method: &str, target: &str) -> HttpResponse {
        let uri: Uri = match target.parse() {
            Ok(uri) => uri,
            Err(e) => {
                debug!("Unparseable request target {}: {}", target, e);
                return HttpResponse::not_found();
            }
        };

        let Some(rest) = uri.path().strip_prefix(self.resolver.paths().image_route()) else {
            return HttpResponse::not_found();
        };

        match method.to_ascii_uppercase().as_str() {
            "GET" => self.handle_get(rest, uri.query()).await,
            "DELETE" => self.handle_delete(rest).await,
            _ => HttpResponse::empty(405),
        }
    }

    /// `GET {route}{id}-{package}.{ext}`
    pub async fn handle_get(&self, file: &str, query: Option<&str>) -> HttpResponse {
        let Some(request) = ImageRequest::parse(file, query) else {
            return HttpResponse::not_found();
        };
        let key = &request.key;

        if !self.resolver.registry().contains(&key.package) {
            return HttpResponse::from_error(&DerivoError::UnknownPackage(key.package.clone()));
        }

        if request.purge {
            // Detached; this request does not wait for the sweep.
            drop(self.invalidator.purge_package(&key.package));
        }

        match self.resolver.resolve(key, request.no_cache).await {
            Ok(path) => HttpResponse::file(path),
            Err(e) => HttpResponse::from_error(&e),
        }
    }

    /// `DELETE {route}{id}`
    pub async fn handle_delete(&self, id: &str) -> HttpResponse {
        if id.is_empty() || id.contains('/') {
            return HttpResponse::not_found();
        }

        match self.sources.find(id).await {
            Ok(Some(_)) => {}
            Ok(None) => return HttpResponse::not_found(),
            Err(e) => return HttpResponse::from_error(&e),
        }

        match self.invalidator.invalidate(id).await {
            Ok(_) => HttpResponse::empty(200),
            Err(e) => HttpResponse::from_error(&e),
        }
    }

    /// Public URL of a derivative
    pub fn url_for(&self, key: &DerivativeKey) -> DerivoResult<String> {
        self.resolver.paths().url_for(key)
    }

    /// Cache path of a derivative, without generating it
    pub fn path_for(&self, key: &DerivativeKey) -> DerivoResult<PathBuf> {
        self.resolver.paths().path_for(key)
    }

    pub fn images_dir(&self) -> &Path {
        self.resolver.paths().images_dir()
    }
}
