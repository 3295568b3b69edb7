//! Cache of expensive results keyed by a pair of object ids.
//!
//! Annotations are a pure optimisation: every caller must stay correct if
//! [`AnnotationStore::get`] always misses. The key for a pair is the same in
//! either order, so a diff cached for `(a, b)` is found again for `(b, a)`.

use crate::errors::ExResult;
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Separator between the two ids of a key; cannot occur in an object id
pub const KEY_SEPARATOR: &str = "...";

/// Cached per-dataset diff of two commits
pub const DIFF_ANNOTATION: &str = "diff/v1";
/// Cached per-dataset feature change counts of two commits
pub const FEATURE_COUNTS_ANNOTATION: &str = "feature-change-counts-exact";

/// Order-independent key for an id pair
pub fn annotation_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, KEY_SEPARATOR, second)
}

/// Storage port for annotations
///
/// Each call acquires and releases its own storage session.
pub trait AnnotationStore: Send + Sync {
    /// Persist `data` for the pair; storing twice adds a second row
    ///
    /// # Errors
    ///
    /// Returns a persistence error, except when the backend is read-only,
    /// which degrades the store to always missing.
    fn store(&self, a: &str, b: &str, annotation_type: &str, data: &Map<String, Value>)
        -> ExResult<()>;

    /// First stored payload for the pair and type, if any
    ///
    /// # Errors
    ///
    /// Returns a persistence or serialization error.
    fn get(&self, a: &str, b: &str, annotation_type: &str) -> ExResult<Option<Map<String, Value>>>;
}

/// Annotation store that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnnotations;

impl AnnotationStore for NullAnnotations {
    fn store(&self, _: &str, _: &str, _: &str, _: &Map<String, Value>) -> ExResult<()> {
        Ok(())
    }

    fn get(&self, _: &str, _: &str, _: &str) -> ExResult<Option<Map<String, Value>>> {
        Ok(None)
    }
}

/// In-process annotation store
#[derive(Debug, Default)]
pub struct MemoryAnnotations {
    rows: Mutex<Vec<(String, String, String)>>,
}

impl MemoryAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, duplicates included
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> crate::errors::ExError {
    crate::errors::ExError::new(crate::errors::ExErrorKind::Internal)
        .with_message("annotation store lock poisoned")
}

impl AnnotationStore for MemoryAnnotations {
    fn store(
        &self,
        a: &str,
        b: &str,
        annotation_type: &str,
        data: &Map<String, Value>,
    ) -> ExResult<()> {
        let text = serde_json::to_string(data)?;
        self.rows.lock().map_err(|_| poisoned())?.push((
            annotation_key(a, b),
            annotation_type.to_string(),
            text,
        ));
        Ok(())
    }

    fn get(&self, a: &str, b: &str, annotation_type: &str) -> ExResult<Option<Map<String, Value>>> {
        let key = annotation_key(a, b);
        let rows = self.rows.lock().map_err(|_| poisoned())?;
        match rows
            .iter()
            .find(|(k, t, _)| *k == key && t == annotation_type)
        {
            Some((_, _, text)) => Ok(Some(serde_json::from_str(text)?)),
            None => Ok(None),
        }
    }
}
