use crate::dataset::{MetaItemName, PrimaryKey};
use serde_json::Value;
use std::fmt;

/// What a conflicting change was aimed at
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConflictItem {
    Meta(MetaItemName),
    Feature(PrimaryKey),
}

impl fmt::Display for ConflictItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictItem::Meta(item) => write!(f, "meta:{}", item),
            ConflictItem::Feature(pk) => write!(f, "feature:{}", pk),
        }
    }
}

/// Why a change does not apply to the current state
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictKind {
    DeleteNonexistentFeature,
    DeleteChangedFeature,
    CreateExistingFeature,
    UpdateChangedFeature,
    UpdateNonexistentFeature,
    /// Asserted prior meta value differs from the current one
    MetaMismatch {
        expected: Value,
        current: Option<Value>,
    },
    AddExistingMeta,
    RemoveNonexistentMeta,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::DeleteNonexistentFeature => {
                f.write_str("Trying to delete nonexistent feature")
            }
            ConflictKind::DeleteChangedFeature => {
                f.write_str("Trying to delete already-changed feature")
            }
            ConflictKind::CreateExistingFeature => {
                f.write_str("Trying to create feature that already exists")
            }
            ConflictKind::UpdateChangedFeature => {
                f.write_str("Trying to update already-changed feature")
            }
            ConflictKind::UpdateNonexistentFeature => {
                f.write_str("Trying to update nonexistent feature")
            }
            ConflictKind::MetaMismatch { expected, current } => write!(
                f,
                "expected {}, current value is {}",
                expected,
                current.as_ref().unwrap_or(&Value::Null)
            ),
            ConflictKind::AddExistingMeta => {
                f.write_str("Trying to add meta item that already exists")
            }
            ConflictKind::RemoveNonexistentMeta => {
                f.write_str("Trying to remove nonexistent meta item")
            }
        }
    }
}

/// A single change that does not apply, e.g.
/// `nz_roads:feature:1: Trying to update already-changed feature`
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub dataset: String,
    pub item: ConflictItem,
    pub kind: ConflictKind,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.dataset, self.item, self.kind)
    }
}
