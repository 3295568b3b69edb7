//! The object store contract.
//!
//! Implementors provide raw framed-byte access; typed reads and writes are
//! provided on top. `tessera-store` backs this with the filesystem CAS and
//! [`super::MemoryObjectStore`] keeps everything in a map.

use super::{Commit, Object, ObjectId, ObjectKind, Tree};
use crate::errors::{ExResult, TesseraError};

pub trait ObjectStore {
    /// Read framed bytes, or `None` if the id is unknown
    ///
    /// # Errors
    ///
    /// Returns an error only when the backing storage fails.
    fn read_raw(&self, id: &ObjectId) -> ExResult<Option<Vec<u8>>>;

    /// Persist framed bytes under their id (idempotent)
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn write_raw(&self, id: &ObjectId, framed: &[u8]) -> ExResult<()>;

    /// # Errors
    ///
    /// Returns `NotFound` if absent, `CorruptObject` if undecodable.
    fn read_object(&self, id: &ObjectId) -> ExResult<Object> {
        let framed = self
            .read_raw(id)?
            .ok_or_else(|| TesseraError::ObjectNotFound { id: id.to_string() })?;
        Ok(Object::decode(id, &framed)?)
    }

    /// # Errors
    ///
    /// Returns an error if encoding or the backing storage fails.
    fn write_object(&self, object: &Object) -> ExResult<ObjectId> {
        let framed = object.encode()?;
        let id = ObjectId::for_framed(&framed);
        self.write_raw(&id, &framed)?;
        tracing::debug!(object_id = %id, kind = %object.kind(), "wrote object");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn contains(&self, id: &ObjectId) -> ExResult<bool> {
        Ok(self.read_raw(id)?.is_some())
    }

    /// # Errors
    ///
    /// As [`ObjectStore::read_object`], plus `CorruptObject` for a non-tree.
    fn read_tree(&self, id: &ObjectId) -> ExResult<Tree> {
        match self.read_object(id)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(wrong_kind(id, ObjectKind::Tree, other.kind()).into()),
        }
    }

    /// # Errors
    ///
    /// As [`ObjectStore::read_object`], plus `CorruptObject` for a non-blob.
    fn read_blob(&self, id: &ObjectId) -> ExResult<Vec<u8>> {
        match self.read_object(id)? {
            Object::Blob(bytes) => Ok(bytes),
            other => Err(wrong_kind(id, ObjectKind::Blob, other.kind()).into()),
        }
    }

    /// # Errors
    ///
    /// As [`ObjectStore::read_object`], plus `CorruptObject` for a non-commit.
    fn read_commit(&self, id: &ObjectId) -> ExResult<Commit> {
        match self.read_object(id)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(wrong_kind(id, ObjectKind::Commit, other.kind()).into()),
        }
    }

    /// # Errors
    ///
    /// As [`ObjectStore::write_object`].
    fn write_blob(&self, bytes: &[u8]) -> ExResult<ObjectId> {
        self.write_object(&Object::Blob(bytes.to_vec()))
    }

    /// # Errors
    ///
    /// As [`ObjectStore::write_object`].
    fn write_tree(&self, tree: &Tree) -> ExResult<ObjectId> {
        self.write_object(&Object::Tree(tree.clone()))
    }

    /// # Errors
    ///
    /// As [`ObjectStore::write_object`].
    fn write_commit(&self, commit: &Commit) -> ExResult<ObjectId> {
        self.write_object(&Object::Commit(commit.clone()))
    }
}

fn wrong_kind(id: &ObjectId, expected: ObjectKind, actual: ObjectKind) -> TesseraError {
    TesseraError::WrongObjectKind {
        id: id.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
