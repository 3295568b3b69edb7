//! Path-based editing of immutable trees.
//!
//! Edits are staged in memory and written bottom-up by [`TreeBuilder::write`].
//! Untouched subtrees keep their ids. Directories left empty by removals are
//! dropped; written entries are sorted by name.

use super::split_path;
use crate::errors::ExResult;
use crate::object::{EntryKind, ObjectId, ObjectStore, Tree, TreeEntry};
use std::collections::BTreeMap;

#[derive(Debug)]
enum Edit {
    Blob(ObjectId),
    Remove,
    Dir(DirEdit),
}

#[derive(Debug, Default)]
struct DirEdit {
    children: BTreeMap<String, Edit>,
}

impl DirEdit {
    fn stage(&mut self, parts: &[&str], leaf: Edit) {
        let (first, rest) = match parts.split_first() {
            Some(split) => split,
            None => return,
        };
        if rest.is_empty() {
            self.children.insert((*first).to_string(), leaf);
            return;
        }
        let child = self
            .children
            .entry((*first).to_string())
            .or_insert_with(|| Edit::Dir(DirEdit::default()));
        if !matches!(child, Edit::Dir(_)) {
            *child = Edit::Dir(DirEdit::default());
        }
        if let Edit::Dir(dir) = child {
            dir.stage(rest, leaf);
        }
    }
}

pub struct TreeBuilder<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    base: Option<ObjectId>,
    root: DirEdit,
}

impl<'s, S: ObjectStore + ?Sized> TreeBuilder<'s, S> {
    /// Start editing `base`, or an empty tree when `None`
    pub fn new(store: &'s S, base: Option<ObjectId>) -> Self {
        Self {
            store,
            base,
            root: DirEdit::default(),
        }
    }

    /// Write `bytes` as a blob at `path`, replacing whatever was there
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for a malformed path, or a store failure.
    pub fn insert_blob(&mut self, path: &str, bytes: &[u8]) -> ExResult<ObjectId> {
        let parts = split_path(path)?;
        let id = self.store.write_blob(bytes)?;
        self.root.stage(&parts, Edit::Blob(id.clone()));
        Ok(id)
    }

    /// Remove the entry at `path`; removing a missing path is a no-op
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for a malformed path.
    pub fn remove(&mut self, path: &str) -> ExResult<()> {
        let parts = split_path(path)?;
        self.root.stage(&parts, Edit::Remove);
        Ok(())
    }

    /// Write all staged edits and return the new root tree id
    ///
    /// # Errors
    ///
    /// Propagates object store failures.
    pub fn write(self) -> ExResult<ObjectId> {
        let written = write_dir(self.store, self.base.as_ref(), &self.root)?;
        match written {
            Some(id) => Ok(id),
            None => self.store.write_tree(&Tree::default()),
        }
    }
}

/// Returns `None` when the resulting directory is empty
fn write_dir<S: ObjectStore + ?Sized>(
    store: &S,
    base: Option<&ObjectId>,
    edits: &DirEdit,
) -> ExResult<Option<ObjectId>> {
    if edits.children.is_empty() {
        return Ok(base.cloned());
    }

    let mut entries: BTreeMap<String, TreeEntry> = BTreeMap::new();
    if let Some(base) = base {
        for entry in store.read_tree(base)?.entries() {
            entries.insert(entry.name.clone(), entry.clone());
        }
    }

    for (name, edit) in &edits.children {
        match edit {
            Edit::Blob(id) => {
                entries.insert(
                    name.clone(),
                    TreeEntry {
                        name: name.clone(),
                        kind: EntryKind::Blob,
                        id: id.clone(),
                    },
                );
            }
            Edit::Remove => {
                entries.remove(name);
            }
            Edit::Dir(sub) => {
                let child_base = entries
                    .get(name)
                    .filter(|e| e.kind == EntryKind::Tree)
                    .map(|e| e.id.clone());
                match write_dir(store, child_base.as_ref(), sub)? {
                    Some(id) => {
                        entries.insert(
                            name.clone(),
                            TreeEntry {
                                name: name.clone(),
                                kind: EntryKind::Tree,
                                id,
                            },
                        );
                    }
                    None => {
                        entries.remove(name);
                    }
                }
            }
        }
    }

    if entries.is_empty() {
        return Ok(None);
    }
    let tree = Tree::new(entries.into_values().collect());
    Ok(Some(store.write_tree(&tree)?))
}
