//! Source image records
//!
//! Source records are owned by an external document layer. Derivo only
//! reads them through [`SourceStore`] and reacts to their lifecycle events.

use crate::error::{DerivoError, DerivoResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Reference to a stored original image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceImage {
    /// Opaque, immutable identifier
    #[serde(alias = "_id")]
    pub id: String,

    /// Location of the original, relative to the server root
    pub filepath: String,

    /// Original file format
    pub extension: String,

    /// Text drawn by packages with a text watermark
    #[serde(default, alias = "watermarkText", skip_serializing_if = "Option::is_none")]
    pub watermark_text: Option<String>,
}

impl SourceImage {
    /// Create a record without watermark text
    pub fn new(
        id: impl Into<String>,
        filepath: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filepath: filepath.into(),
            extension: extension.into(),
            watermark_text: None,
        }
    }

    /// Builder-style watermark text
    pub fn with_watermark_text(mut self, text: impl Into<String>) -> Self {
        self.watermark_text = Some(text.into());
        self
    }

    /// Watermark text, if present and not blank
    pub fn watermark(&self) -> Option<&str> {
        self.watermark_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Join a stored path onto the server root
///
/// Stored paths are root-relative even when written with a leading
/// separator, so `/uploads/a.png` lands under `root` too.
pub fn under_root(root: &Path, stored: &str) -> PathBuf {
    root.join(stored.trim_start_matches(['/', '\\']))
}

impl SourceImage {
    /// Location of the original under `root`
    pub fn path_under(&self, root: &Path) -> PathBuf {
        under_root(root, &self.filepath)
    }
}

/// Read access to source records
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Find a record by id
    async fn find(&self, id: &str) -> DerivoResult<Option<SourceImage>>;
}

/// In-process store, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    records: RwLock<HashMap<String, SourceImage>>,
}

impl MemorySourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub fn insert(&self, source: SourceImage) {
        if let Ok(mut records) = self.records.write() {
            records.insert(source.id.clone(), source);
        }
    }

    /// Remove a record
    pub fn remove(&self, id: &str) -> Option<SourceImage> {
        self.records.write().ok()?.remove(id)
    }
}

impl FromIterator<SourceImage> for MemorySourceStore {
    fn from_iter<I: IntoIterator<Item = SourceImage>>(iter: I) -> Self {
        let records = iter.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn find(&self, id: &str) -> DerivoResult<Option<SourceImage>> {
        let records = self
            .records
            .read()
            .map_err(|_| DerivoError::Internal("source store lock poisoned".to_string()))?;
        Ok(records.get(id).cloned())
    }
}

/// Store backed by a JSON array of records on disk, loaded once
#[derive(Debug)]
pub struct CatalogSourceStore {
    inner: MemorySourceStore,
}

impl CatalogSourceStore {
    /// Load a catalogue file; a missing file yields an empty store
    pub async fn load(path: &Path) -> DerivoResult<Self> {
        if !path.exists() {
            debug!("Source catalogue {} not found, starting empty", path.display());
            return Ok(Self {
                inner: MemorySourceStore::new(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DerivoError::io(format!("reading catalogue {}", path.display()), e))?;
        let records: Vec<SourceImage> = serde_json::from_str(&content)?;

        debug!(
            "Loaded {} source records from {}",
            records.len(),
            path.display()
        );
        Ok(Self {
            inner: records.into_iter().collect(),
        })
    }
}

#[async_trait]
impl SourceStore for CatalogSourceStore {
    async fn find(&self, id: &str) -> DerivoResult<Option<SourceImage>> {
        self.inner.find(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stored_paths_stay_under_root() {
        let root = Path::new("/srv/site");
        assert_eq!(
            under_root(root, "/uploads/abc.png"),
            PathBuf::from("/srv/site/uploads/abc.png")
        );
        assert_eq!(
            under_root(root, "uploads/abc.png"),
            PathBuf::from("/srv/site/uploads/abc.png")
        );
        assert_eq!(
            SourceImage::new("abc", "\\uploads\\abc.png", "png").path_under(root),
            root.join("uploads\\abc.png")
        );
    }

    #[test]
    fn blank_watermark_text_is_absent() {
        let source = SourceImage::new("abc", "uploads/abc.jpg", "jpg").with_watermark_text("  ");
        assert_eq!(source.watermark(), None);

        let source = source.with_watermark_text("(c) Derivo");
        assert_eq!(source.watermark(), Some("(c) Derivo"));
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemorySourceStore::new();
        store.insert(SourceImage::new("abc", "uploads/abc.jpg", "jpg"));

        assert!(store.find("abc").await.unwrap().is_some());
        assert!(store.find("nope").await.unwrap().is_none());

        store.remove("abc");
        assert!(store.find("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalogue_accepts_document_layer_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.json");
        tokio::fs::write(
            &path,
            concat!(
                r#"[{"_id": "abc", "filepath": "uploads/abc.jpg", "#,
                r#""extension": "jpg", "watermarkText": "hi"}]"#,
            ),
        )
        .await
        .unwrap();

        let store = CatalogSourceStore::load(&path).await.unwrap();
        let source = store.find("abc").await.unwrap().unwrap();
        assert_eq!(source.filepath, "uploads/abc.jpg");
        assert_eq!(source.watermark(), Some("hi"));
    }

    #[tokio::test]
    async fn missing_catalogue_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = CatalogSourceStore::load(&dir.path().join("none.json"))
            .await
            .unwrap();
        assert!(store.find("abc").await.unwrap().is_none());
    }
}
