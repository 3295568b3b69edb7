//! Error handling for tessera-store
//!
//! Wraps tessera-core ExError with store-specific helpers

use tessera_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create a CAS collision error
pub fn cas_collision(digest: &str) -> ExError {
    ExError::new(ExErrorKind::CorruptObject)
        .with_op("cas_write")
        .with_item(digest)
        .with_message(format!("CAS collision for digest {}", digest))
}

/// Create a database error from rusqlite::Error
///
/// A write refused because the database is read-only maps to
/// `ReadOnlyStorage` so callers that tolerate it can tell it apart.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let kind = if is_read_only(&err) {
        ExErrorKind::ReadOnlyStorage
    } else {
        ExErrorKind::Persistence
    };
    ExError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Whether SQLite refused a write because the database is read-only
pub fn is_read_only(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ReadOnly)
    )
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a configuration error
pub fn config_error(reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::InvalidInput)
        .with_op("config")
        .with_message(reason)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rusqlite::{Connection, OpenFlags};
    use tempfile::TempDir;

    #[test]
    fn test_read_only_write_maps_to_read_only_storage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.db");
        Connection::open(&path)
            .unwrap()
            .execute("CREATE TABLE t (x INTEGER)", [])
            .unwrap();

        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).unwrap();
        let err = conn.execute("INSERT INTO t (x) VALUES (1)", []).unwrap_err();
        assert!(is_read_only(&err));
        assert_eq!(from_rusqlite(err).kind(), ExErrorKind::ReadOnlyStorage);
    }

    #[test]
    fn test_other_failures_are_persistence() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO missing (x) VALUES (1)", []).unwrap_err();
        assert!(!is_read_only(&err));
        assert_eq!(from_rusqlite(err).kind(), ExErrorKind::Persistence);
    }
}
