//! Tessera Store - Persistence layer with SQLite and a filesystem CAS
//!
//! Provides:
//! - SQLite schemas with a migrations framework (repo, annotations, working copy)
//! - Content-addressable object storage implementing `ObjectStore`
//! - Branch refs and the symbolic HEAD with compare-and-set updates
//! - The SQLite diff annotation cache, tolerant of read-only mounts
//! - The SQLite working copy
//! - Repository configuration (`config.toml`)

pub mod annotations;
pub mod cas;
pub mod config;
pub mod db;
pub mod errors;
pub mod migrations;
pub mod refs;
pub mod working_copy;

// Re-export key types
pub use annotations::SqliteAnnotations;
pub use cas::CasObjectStore;
pub use config::RepoConfig;
pub use errors::Result;
pub use refs::RefStore;
pub use working_copy::SqliteWorkingCopy;
