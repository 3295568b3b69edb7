//! Directory-by-directory traversal of a snapshot tree.
//!
//! [`TreeWalk`] yields one [`WalkEntry`] per directory below (and including)
//! the starting tree. Entries are handed out as `&mut` borrows, so a caller
//! walking in [`WalkOrder::PreOrder`] may edit `subtree_names` before asking
//! for the next entry:
//!
//! - removing a name prunes that subtree from the walk
//! - reordering the names reorders the traversal of the remaining subtrees
//!
//! In [`WalkOrder::PostOrder`] a directory is yielded after all of its
//! descendants. Its child names were consumed before it was yielded, so
//! editing `subtree_names` at that point has no effect on the walk.
//!
//! Children are visited in the tree's native entry order. The first read
//! failure is returned and the walk then ends.
//!
//! ```
//! use tessera_core::object::MemoryObjectStore;
//! use tessera_core::tree::{walk_tree, TreeBuilder, WalkOrder};
//!
//! let store = MemoryObjectStore::new();
//! let mut builder = TreeBuilder::new(&store, None);
//! builder.insert_blob("keep/a", b"1").unwrap();
//! builder.insert_blob("skip/b", b"2").unwrap();
//! let root = builder.write().unwrap();
//!
//! let mut paths = Vec::new();
//! let mut walk = walk_tree(&store, &root, "", WalkOrder::PreOrder);
//! while let Some(entry) = walk.next_entry().unwrap() {
//!     entry.subtree_names.retain(|n| n != "skip");
//!     paths.push(entry.path.clone());
//! }
//! assert_eq!(paths, vec!["".to_string(), "keep".to_string()]);
//! ```

use super::join_path;
use crate::errors::{ExResult, TesseraError};
use crate::object::{EntryKind, ObjectId, ObjectStore, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// A directory is yielded before its descendants
    PreOrder,
    /// A directory is yielded after its descendants
    PostOrder,
}

/// One directory visited by the walk
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub tree_id: ObjectId,
    pub tree: Tree,
    /// Path of this directory, `""` for the starting tree without a prefix
    pub path: String,
    /// Child directory names; editable in pre-order to steer the walk
    pub subtree_names: Vec<String>,
    pub blob_names: Vec<String>,
}

struct Frame {
    entry: WalkEntry,
    next_child: usize,
}

/// Single-pass directory walk; see the module docs
pub struct TreeWalk<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    order: WalkOrder,
    root: Option<(ObjectId, String)>,
    // pre-order: directories not yet read, top of stack visited next
    pending: Vec<(ObjectId, String)>,
    // post-order: the chain of directories currently being descended
    frames: Vec<Frame>,
    current: Option<WalkEntry>,
    finished: bool,
}

/// Start a walk at the tree `root`, reporting paths under `prefix`
pub fn walk_tree<'s, S: ObjectStore + ?Sized>(
    store: &'s S,
    root: &ObjectId,
    prefix: &str,
    order: WalkOrder,
) -> TreeWalk<'s, S> {
    TreeWalk {
        store,
        order,
        root: Some((root.clone(), prefix.to_string())),
        pending: Vec::new(),
        frames: Vec::new(),
        current: None,
        finished: false,
    }
}

impl<'s, S: ObjectStore + ?Sized> TreeWalk<'s, S> {
    /// Advance to the next directory
    ///
    /// Returns `Ok(None)` once every directory has been visited, or after a
    /// failure has been reported.
    ///
    /// # Errors
    ///
    /// Returns the first object read failure, or `PathNotFound` if a name
    /// added to `subtree_names` does not name a subtree.
    pub fn next_entry(&mut self) -> ExResult<Option<&mut WalkEntry>> {
        if self.finished {
            return Ok(None);
        }
        let step = match self.order {
            WalkOrder::PreOrder => self.advance_pre_order(),
            WalkOrder::PostOrder => self.advance_post_order(),
        };
        match step {
            Ok(Some(entry)) => {
                self.current = Some(entry);
                Ok(self.current.as_mut())
            }
            Ok(None) => {
                self.finished = true;
                self.current = None;
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                self.current = None;
                Err(err)
            }
        }
    }

    /// Drive the walk to completion, calling `visit` for every directory
    ///
    /// # Errors
    ///
    /// Returns the first error from the walk or from `visit`.
    pub fn visit<F>(mut self, mut visit: F) -> ExResult<()>
    where
        F: FnMut(&mut WalkEntry) -> ExResult<()>,
    {
        while let Some(entry) = self.next_entry()? {
            visit(entry)?;
        }
        Ok(())
    }

    fn advance_pre_order(&mut self) -> ExResult<Option<WalkEntry>> {
        if let Some(root) = self.root.take() {
            self.pending.push(root);
        }
        // Children of the previous entry are scheduled only now, after the
        // caller has had the chance to edit its subtree names.
        if let Some(previous) = self.current.take() {
            for name in previous.subtree_names.iter().rev() {
                let child = subtree_id(&previous, name)?;
                self.pending
                    .push((child, join_path(&previous.path, name)));
            }
        }
        match self.pending.pop() {
            Some((id, path)) => Ok(Some(self.load(id, path)?)),
            None => Ok(None),
        }
    }

    fn advance_post_order(&mut self) -> ExResult<Option<WalkEntry>> {
        self.current = None;
        if let Some((id, path)) = self.root.take() {
            let entry = self.load(id, path)?;
            self.frames.push(Frame {
                entry,
                next_child: 0,
            });
        }
        loop {
            let Some(top) = self.frames.last_mut() else {
                return Ok(None);
            };
            if top.next_child < top.entry.subtree_names.len() {
                let name = top.entry.subtree_names[top.next_child].clone();
                top.next_child += 1;
                let child = subtree_id(&top.entry, &name)?;
                let path = join_path(&top.entry.path, &name);
                let entry = self.load(child, path)?;
                self.frames.push(Frame {
                    entry,
                    next_child: 0,
                });
            } else {
                return Ok(self.frames.pop().map(|frame| frame.entry));
            }
        }
    }

    fn load(&self, tree_id: ObjectId, path: String) -> ExResult<WalkEntry> {
        let tree = self.store.read_tree(&tree_id)?;
        let mut subtree_names = Vec::new();
        let mut blob_names = Vec::new();
        for entry in tree.entries() {
            match entry.kind {
                EntryKind::Tree => subtree_names.push(entry.name.clone()),
                EntryKind::Blob => blob_names.push(entry.name.clone()),
            }
        }
        Ok(WalkEntry {
            tree_id,
            tree,
            path,
            subtree_names,
            blob_names,
        })
    }
}

fn subtree_id(parent: &WalkEntry, name: &str) -> ExResult<ObjectId> {
    match parent.tree.get(name) {
        Some(entry) if entry.kind == EntryKind::Tree => Ok(entry.id.clone()),
        _ => Err(TesseraError::PathNotFound {
            path: join_path(&parent.path, name),
        }
        .into()),
    }
}
