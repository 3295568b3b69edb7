//! The on-disk object store

#![allow(clippy::result_large_err)]

use super::FsStore;
use std::path::PathBuf;
use tessera_core::errors::{ExError, ExErrorKind, ExResult};
use tessera_core::object::{ObjectId, ObjectStore};

/// `ObjectStore` over a filesystem CAS directory (`.tessera/objects`)
#[derive(Debug, Clone)]
pub struct CasObjectStore {
    cas: FsStore,
}

impl CasObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            cas: FsStore::new(root),
        }
    }
}

impl ObjectStore for CasObjectStore {
    fn read_raw(&self, id: &ObjectId) -> ExResult<Option<Vec<u8>>> {
        self.cas.read(id.as_str())
    }

    fn write_raw(&self, id: &ObjectId, framed: &[u8]) -> ExResult<()> {
        if ObjectId::for_framed(framed) != *id {
            return Err(ExError::new(ExErrorKind::Internal)
                .with_op("cas_write")
                .with_item(id.as_str())
                .with_message("object bytes do not match their id"));
        }
        self.cas.write(id.as_str(), framed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tessera_core::object::{EntryKind, Tree, TreeEntry};

    #[test]
    fn test_typed_objects_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let blob;
        let tree;
        {
            let store = CasObjectStore::new(dir.path());
            blob = store.write_blob(b"feature").unwrap();
            tree = store
                .write_tree(&Tree::new(vec![TreeEntry {
                    name: "f".to_string(),
                    kind: EntryKind::Blob,
                    id: blob.clone(),
                }]))
                .unwrap();
        }

        let store = CasObjectStore::new(dir.path());
        assert_eq!(store.read_blob(&blob).unwrap(), b"feature");
        assert_eq!(store.read_tree(&tree).unwrap().entries()[0].id, blob);
        assert!(dir.path().join(&blob.as_str()[..2]).join(blob.as_str()).exists());
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = CasObjectStore::new(dir.path());
        let id = ObjectId::for_framed(b"blob 0\0");
        assert!(!store.contains(&id).unwrap());
        assert_eq!(
            store.read_object(&id).unwrap_err().kind(),
            ExErrorKind::NotFound
        );
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = CasObjectStore::new(dir.path());
        let id = ObjectId::for_framed(b"blob 1\0a");
        assert!(store.write_raw(&id, b"blob 1\0b").is_err());
    }
}
