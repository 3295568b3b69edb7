//! SQLite diff annotation cache (`annotations.db`)
//!
//! The database is opened lazily on every call and closed again before the
//! call returns. A store that fails because the database is read-only
//! switches the cache to always missing for the rest of the process.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::{annotation_migrations, apply_migrations};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tessera_core::annotations::{annotation_key, AnnotationStore};
use tessera_core::errors::{ExError, ExErrorKind, ExResult};

#[derive(Debug)]
pub struct SqliteAnnotations {
    path: PathBuf,
    degraded: AtomicBool,
}

impl SqliteAnnotations {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a read-only failure has switched the cache off
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self) {
        tracing::info!(
            path = %self.path.display(),
            "Can't store annotation; annotations.db is read-only"
        );
        self.degraded.store(true, Ordering::Relaxed);
    }

    fn open_for_write(&self) -> Result<Connection> {
        let mut conn = match db::open(&self.path) {
            Ok(conn) => conn,
            // A read-only directory cannot hold a new database file
            Err(err) if !self.path.exists() && parent_is_read_only(&self.path) => {
                return Err(ExError::new(ExErrorKind::ReadOnlyStorage)
                    .with_op("open_annotations")
                    .with_message("annotations.db cannot be created")
                    .with_source(err));
            }
            Err(err) => return Err(err),
        };
        db::configure(&conn)?;
        apply_migrations(&mut conn, annotation_migrations())?;
        Ok(conn)
    }

    fn open_for_read(&self) -> Option<Connection> {
        if !self.path.exists() {
            return None;
        }
        match Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        ) {
            Ok(conn) => Some(conn),
            Err(err) => {
                tracing::debug!(error = %err, "annotations.db could not be opened");
                None
            }
        }
    }

    fn insert(&self, key: &str, annotation_type: &str, text: &str) -> Result<()> {
        let outcome = self.open_for_write().and_then(|conn| {
            conn.execute(
                "INSERT INTO annotations (object_id, annotation_type, data) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, annotation_type, text],
            )
            .map_err(from_rusqlite)
        });
        match outcome {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ExErrorKind::ReadOnlyStorage => {
                self.degrade();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn parent_is_read_only(path: &Path) -> bool {
    path.parent()
        .and_then(|dir| std::fs::metadata(dir).ok())
        .map(|meta| meta.permissions().readonly())
        .unwrap_or(false)
}

impl AnnotationStore for SqliteAnnotations {
    fn store(
        &self,
        a: &str,
        b: &str,
        annotation_type: &str,
        data: &Map<String, Value>,
    ) -> ExResult<()> {
        if self.is_degraded() {
            return Ok(());
        }
        let key = annotation_key(a, b);
        let text = serde_json::to_string(data)?;
        self.insert(&key, annotation_type, &text)?;
        tracing::debug!(object_id = %key, annotation_type, "stored annotation");
        Ok(())
    }

    fn get(&self, a: &str, b: &str, annotation_type: &str) -> ExResult<Option<Map<String, Value>>> {
        if self.is_degraded() {
            return Ok(None);
        }
        let key = annotation_key(a, b);
        let Some(conn) = self.open_for_read() else {
            tracing::debug!(object_id = %key, annotation_type, "annotation miss (no database)");
            return Ok(None);
        };

        let found: Option<String> = match conn
            .query_row(
                "SELECT data FROM annotations WHERE object_id = ?1 AND annotation_type = ?2 LIMIT 1",
                rusqlite::params![key, annotation_type],
                |row| row.get(0),
            )
            .optional()
        {
            Ok(found) => found,
            // A database that was never migrated has no annotations table
            Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.starts_with("no such table") => {
                None
            }
            Err(err) => return Err(from_rusqlite(err)),
        };

        match found {
            Some(text) => {
                tracing::debug!(object_id = %key, annotation_type, "annotation hit");
                Ok(Some(serde_json::from_str(&text)?))
            }
            None => {
                tracing::debug!(object_id = %key, annotation_type, "annotation miss");
                Ok(None)
            }
        }
    }
}

/// Number of stored rows, duplicates included
pub fn row_count(path: &Path) -> Result<i64> {
    let conn = db::open(path)?;
    conn.query_row("SELECT COUNT(*) FROM annotations", [], |row| row.get(0))
        .map_err(from_rusqlite)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use tessera_core::annotations::DIFF_ANNOTATION;

    fn payload() -> Map<String, Value> {
        json!({"datasets": {"ds": {"feature": []}}})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_get_before_any_store_misses() {
        let dir = TempDir::new().unwrap();
        let cache = SqliteAnnotations::new(dir.path().join("annotations.db"));
        assert_eq!(cache.get("a", "b", DIFF_ANNOTATION).unwrap(), None);
        assert!(!dir.path().join("annotations.db").exists());
    }

    #[test]
    fn test_store_then_get_reversed() {
        let dir = TempDir::new().unwrap();
        let cache = SqliteAnnotations::new(dir.path().join("annotations.db"));
        cache.store("a", "b", DIFF_ANNOTATION, &payload()).unwrap();
        assert_eq!(cache.get("b", "a", DIFF_ANNOTATION).unwrap(), Some(payload()));
        assert_eq!(cache.get("a", "b", "other").unwrap(), None);
    }

    #[test]
    fn test_duplicate_rows_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.db");
        let cache = SqliteAnnotations::new(&path);
        cache.store("a", "b", DIFF_ANNOTATION, &payload()).unwrap();
        cache.store("b", "a", DIFF_ANNOTATION, &payload()).unwrap();
        assert_eq!(row_count(&path).unwrap(), 2);
        assert_eq!(cache.get("a", "b", DIFF_ANNOTATION).unwrap(), Some(payload()));
    }

    #[test]
    fn test_read_only_database_degrades_to_miss() {
        // GIVEN: a populated cache reopened through a read-only URI
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.db");
        SqliteAnnotations::new(&path)
            .store("a", "b", DIFF_ANNOTATION, &payload())
            .unwrap();
        let cache = SqliteAnnotations::new(format!("file:{}?mode=ro", path.display()));

        // WHEN: a store is attempted
        cache.store("c", "d", DIFF_ANNOTATION, &payload()).unwrap();

        // THEN: the cache is switched off and nothing was written
        assert!(cache.is_degraded());
        assert_eq!(cache.get("a", "b", DIFF_ANNOTATION).unwrap(), None);
        assert_eq!(cache.get("c", "d", DIFF_ANNOTATION).unwrap(), None);
        assert_eq!(row_count(&path).unwrap(), 1);
    }
}
