//! Migration framework
//!
//! Provides:
//! - Migration runner with checksums and idempotent application
//! - Embedded SQL migrations, one set per database file

mod checksums;
mod embedded;
mod runner;

pub use embedded::{annotation_migrations, repo_migrations, working_copy_migrations, Migration};
pub use runner::apply_migrations;
