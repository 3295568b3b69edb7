//! Migration runner
//!
//! Applies migrations in order inside one transaction each, recording a
//! checksum per migration

#![allow(clippy::result_large_err)]

use crate::errors::{checksum_mismatch, from_rusqlite, is_read_only, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::Migration;
use rusqlite::{Connection, OptionalExtension};

/// Apply all pending migrations to the database
pub fn apply_migrations(conn: &mut Connection, migrations: &[Migration]) -> Result<()> {
    create_schema_version_table(conn)?;

    for migration in migrations {
        apply_migration(conn, migration)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist
fn create_schema_version_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT
        )",
        [],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

/// Apply a single migration if not already applied
fn apply_migration(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let checksum = compute_checksum(migration.sql);

    let recorded: Option<Option<String>> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?",
            [migration.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    if let Some(recorded) = recorded {
        return match recorded {
            Some(expected) if expected != checksum => {
                Err(checksum_mismatch(migration.id, &expected, &checksum))
            }
            _ => Ok(()),
        };
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;

    tx.execute_batch(migration.sql).map_err(|e| {
        if is_read_only(&e) {
            from_rusqlite(e)
        } else {
            migration_error(migration.id, &e.to_string())
        }
    })?;

    let now = chrono::Utc::now().timestamp();
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?, ?, ?)",
        rusqlite::params![migration.id, now, checksum],
    )
    .map_err(from_rusqlite)?;

    tx.commit().map_err(from_rusqlite)?;
    tracing::debug!(migration = migration.id, "applied migration");

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::migrations::{annotation_migrations, repo_migrations, working_copy_migrations};

    #[test]
    fn test_apply_every_set() {
        for set in [repo_migrations(), annotation_migrations(), working_copy_migrations()] {
            let mut conn = Connection::open_in_memory().unwrap();
            apply_migrations(&mut conn, set).unwrap();
        }
    }

    #[test]
    fn test_idempotency() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, repo_migrations()).unwrap();
        apply_migrations(&mut conn, repo_migrations()).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, repo_migrations().len() as i64);
    }

    #[test]
    fn test_edited_migration_detected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn, repo_migrations()).unwrap();
        conn.execute("UPDATE schema_version SET checksum = 'stale'", [])
            .unwrap();
        assert!(apply_migrations(&mut conn, repo_migrations()).is_err());
    }
}
