//! Tessera Engine - Orchestration layer
//!
//! Opens repositories and runs the high-level commands (apply, diff,
//! create-patch, show, status) that coordinate the core domain logic with
//! the persistence layer.

pub mod commands;
pub mod repo;

pub use repo::{InitOptions, Repository};
