//! Per-page annotation store.
//!
//! The in-memory [`AnnotationSet`] is the source of truth; the storage
//! record is a mirror, rewritten in full on every change.

use crate::models::{AnnotationSet, DrawingStroke, HighlightAnnotation};
use crate::storage::{StorageBackend, StorageError};

/// Prefix of every page record key.
pub const PAGE_KEY_PREFIX: &str = "web-annotator-";

/// Storage key for a page, derived from its full URL.
pub fn page_key(page_url: &str) -> String {
    format!("{PAGE_KEY_PREFIX}{page_url}")
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to persist annotations: {0}")]
    Storage(#[from] StorageError),
    #[error("Import is not a valid annotation set: {0}")]
    MalformedImport(serde_json::Error),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::Storage(e) if e.is_quota_exceeded())
    }
}

pub struct AnchorStore<S> {
    key: String,
    set: AnnotationSet,
    backend: S,
}

impl<S: StorageBackend> AnchorStore<S> {
    /// A store for `page_url`, initially empty. Call [`AnchorStore::load`]
    /// to pick up the persisted record.
    pub fn new(backend: S, page_url: &str) -> Self {
        Self {
            key: page_key(page_url),
            set: AnnotationSet::default(),
            backend,
        }
    }

    /// Reads the persisted record. Returns whether one existed; without one
    /// the store is reset to empty.
    pub fn load(&mut self) -> Result<bool, StorageError> {
        match self.backend.get(&self.key)? {
            Some(value) => {
                self.set = serde_json::from_value(value)?;
                Ok(true)
            }
            None => {
                self.set = AnnotationSet::default();
                Ok(false)
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn highlights(&self) -> &[HighlightAnnotation] {
        &self.set.highlights
    }

    pub fn drawings(&self) -> &[DrawingStroke] {
        &self.set.drawings
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Read-only copy of the current set.
    pub fn snapshot(&self) -> AnnotationSet {
        self.set.clone()
    }

    /// Appends a highlight and persists. The highlight stays in memory even
    /// when persisting fails.
    pub fn append_highlight(&mut self, highlight: HighlightAnnotation) -> Result<(), StoreError> {
        self.set.highlights.push(highlight);
        self.persist()
    }

    /// Appends a stroke and persists. The stroke stays in memory even when
    /// persisting fails.
    pub fn append_stroke(&mut self, stroke: DrawingStroke) -> Result<(), StoreError> {
        self.set.drawings.push(stroke);
        self.persist()
    }

    /// Replaces everything with an imported set.
    pub fn replace(&mut self, set: AnnotationSet) -> Result<(), StoreError> {
        self.set = set;
        self.persist()
    }

    /// Parses exported JSON and replaces the set. Malformed input leaves the
    /// store untouched.
    pub fn replace_from_json(&mut self, json: &str) -> Result<(), StoreError> {
        let set = serde_json::from_str(json).map_err(StoreError::MalformedImport)?;
        self.replace(set)
    }

    /// Empties the set and removes the persisted record.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.set = AnnotationSet::default();
        self.backend.remove(&self.key)?;
        Ok(())
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let value = serde_json::to_value(&self.set).map_err(StorageError::from)?;
        self.backend.set(&self.key, value)?;
        Ok(())
    }
}
