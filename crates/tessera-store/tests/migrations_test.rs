// Integration tests for the migration framework on disk

use tempfile::TempDir;
use tessera_store::db;
use tessera_store::migrations::{annotation_migrations, repo_migrations, working_copy_migrations};

fn table_names(conn: &rusqlite::Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_each_database_gets_its_own_tables() {
    // GIVEN: Three fresh database files
    let dir = TempDir::new().unwrap();

    // WHEN: Each is opened with its migration set
    let repo = db::open_migrated(dir.path().join("repo.db"), repo_migrations()).unwrap();
    let annotations =
        db::open_migrated(dir.path().join("annotations.db"), annotation_migrations()).unwrap();
    let working =
        db::open_migrated(dir.path().join("working.db"), working_copy_migrations()).unwrap();

    // THEN: Each holds exactly its own tables plus schema_version
    assert_eq!(table_names(&repo), vec!["head", "refs", "schema_version"]);
    assert_eq!(table_names(&annotations), vec!["annotations", "schema_version"]);
    assert_eq!(
        table_names(&working),
        vec!["schema_version", "wc_features", "wc_meta", "wc_state"]
    );
}

#[test]
fn test_reopen_is_idempotent() {
    // GIVEN: A migrated repo database
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("repo.db");
    drop(db::open_migrated(&path, repo_migrations()).unwrap());

    // WHEN: It is opened again
    let conn = db::open_migrated(&path, repo_migrations()).unwrap();

    // THEN: Each migration is recorded once
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}
