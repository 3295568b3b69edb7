//! Immutable content-addressed objects: blobs, trees and commits.
//!
//! Every object is framed as `"<kind> <len>\0" + payload` and identified by
//! the hex SHA-256 of the framed bytes, so two objects with equal content
//! always share an id and objects of different kinds never collide.
//!
//! Tree and commit payloads are JSON. Tree entries keep the order they were
//! written in; [`crate::tree::TreeBuilder`] writes them sorted by name.

pub mod memory;
pub mod signature;
pub mod store;

pub use memory::MemoryObjectStore;
pub use signature::Signature;
pub use store::ObjectStore;

use crate::errors::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex SHA-256 identifier of a framed object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse a 64-character lowercase hex id
    ///
    /// # Errors
    ///
    /// Returns `InvalidObjectId` if `value` is not 64 lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self> {
        let valid = value.len() == 64
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(TesseraError::InvalidObjectId {
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Compute the id of already-framed object bytes
    pub fn for_framed(framed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(framed);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TesseraError;

    fn try_from(value: String) -> Result<Self> {
        ObjectId::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

/// Object kind tag written into the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Tree,
    Blob,
}

/// One named entry in a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub id: ObjectId,
}

/// An ordered directory listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree keeping `entries` in the given order
    pub fn new(entries: Vec<TreeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a direct child by name
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

/// A snapshot of the whole repository plus history metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }
}

/// Any storable object
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Frame the object for storage
    ///
    /// # Errors
    ///
    /// Returns `Json` if a tree or commit payload fails to serialize.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = match self {
            Object::Blob(bytes) => bytes.clone(),
            Object::Tree(tree) => serde_json::to_vec(tree)?,
            Object::Commit(commit) => serde_json::to_vec(commit)?,
        };
        let mut framed = format!("{} {}\0", self.kind(), payload.len()).into_bytes();
        framed.extend_from_slice(&payload);
        Ok(framed)
    }

    /// Decode framed bytes read back for `id`
    ///
    /// # Errors
    ///
    /// Returns `CorruptObject` if the header is malformed, the length does
    /// not match, or the payload does not decode.
    pub fn decode(id: &ObjectId, framed: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| TesseraError::CorruptObject {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let nul = framed
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| corrupt("missing header terminator"))?;
        let header = std::str::from_utf8(&framed[..nul]).map_err(|_| corrupt("bad header"))?;
        let (tag, len) = header
            .split_once(' ')
            .ok_or_else(|| corrupt("bad header"))?;
        let kind = ObjectKind::parse(tag).ok_or_else(|| corrupt("unknown object kind"))?;
        let len: usize = len.parse().map_err(|_| corrupt("bad length"))?;
        let payload = &framed[nul + 1..];
        if payload.len() != len {
            return Err(corrupt("length mismatch"));
        }

        let object = match kind {
            ObjectKind::Blob => Object::Blob(payload.to_vec()),
            ObjectKind::Tree => {
                Object::Tree(serde_json::from_slice(payload).map_err(|e| corrupt(&e.to_string()))?)
            }
            ObjectKind::Commit => Object::Commit(
                serde_json::from_slice(payload).map_err(|e| corrupt(&e.to_string()))?,
            ),
        };
        Ok(object)
    }
}
