//! Hierarchical tree access: path lookup, traversal and editing.

pub mod builder;
pub mod walk;

pub use builder::TreeBuilder;
pub use walk::{walk_tree, TreeWalk, WalkEntry, WalkOrder};

use crate::errors::{ExResult, TesseraError};
use crate::object::{EntryKind, ObjectId, ObjectStore, TreeEntry};

/// Join a parent path and a child name with `/`
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Split a `/`-separated path into components, rejecting empty components
///
/// # Errors
///
/// Returns `InvalidPath` for an empty path or one with empty components.
pub fn split_path(path: &str) -> Result<Vec<&str>, TesseraError> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(TesseraError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok(parts)
}

/// Resolve `path` below the tree `root`, returning the entry if present
///
/// # Errors
///
/// Propagates object store failures; `InvalidPath` for malformed paths.
pub fn get_path<S: ObjectStore + ?Sized>(
    store: &S,
    root: &ObjectId,
    path: &str,
) -> ExResult<Option<TreeEntry>> {
    let parts = split_path(path)?;
    let mut current = root.clone();
    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        let tree = store.read_tree(&current)?;
        let Some(entry) = tree.get(part) else {
            return Ok(None);
        };
        if i == last {
            return Ok(Some(entry.clone()));
        }
        if entry.kind != EntryKind::Tree {
            return Ok(None);
        }
        current = entry.id.clone();
    }
    Ok(None)
}
