//! Embedded SQL migrations
//!
//! Migrations are embedded at compile time using include_str!

/// Migration metadata
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// Migrations for `repo.db`
pub fn repo_migrations() -> &'static [Migration] {
    &[Migration {
        id: "001_refs",
        sql: include_str!("../../migrations/repo/001_refs.sql"),
    }]
}

/// Migrations for `annotations.db`
pub fn annotation_migrations() -> &'static [Migration] {
    &[Migration {
        id: "001_annotations",
        sql: include_str!("../../migrations/annotations/001_annotations.sql"),
    }]
}

/// Migrations for `working.db`
pub fn working_copy_migrations() -> &'static [Migration] {
    &[Migration {
        id: "001_working_copy",
        sql: include_str!("../../migrations/working_copy/001_working_copy.sql"),
    }]
}
