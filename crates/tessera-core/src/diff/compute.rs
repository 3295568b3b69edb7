//! Computing diffs between snapshots, or between in-memory dataset states.
//!
//! Tree diffs compare object ids before reading content: an unchanged
//! dataset, meta item or feature shard is skipped without being read.

use super::model::{DatasetDiff, FeatureChange, FeatureDelta, RepoDiff, ValueChange};
use crate::dataset::{
    decode_feature, feature_blob_ids_in, find_datasets, Dataset, DatasetState, Feature,
    MetaItemName, PrimaryKey,
};
use crate::errors::{ExResult, Result};
use crate::object::{EntryKind, ObjectId, ObjectStore};
use std::collections::{BTreeMap, BTreeSet};

/// Diff two snapshot trees; `old = None` diffs against an empty snapshot
///
/// # Errors
///
/// Propagates object store failures and undecodable blobs.
pub fn diff_trees<S: ObjectStore + ?Sized>(
    store: &S,
    old: Option<&ObjectId>,
    new: &ObjectId,
) -> ExResult<RepoDiff> {
    let mut diff = RepoDiff::default();
    if old == Some(new) {
        return Ok(diff);
    }

    let old_datasets = match old {
        Some(old) => find_datasets(store, old)?,
        None => BTreeMap::new(),
    };
    let new_datasets = find_datasets(store, new)?;

    let names: BTreeSet<&String> = old_datasets.keys().chain(new_datasets.keys()).collect();
    for name in names {
        let ds_diff = diff_datasets(store, old_datasets.get(name), new_datasets.get(name))?;
        diff.insert(name.clone(), ds_diff);
    }
    tracing::debug!(
        old = ?old.map(|o| o.short()),
        new = new.short(),
        changes = diff.change_count(),
        "computed tree diff"
    );
    Ok(diff)
}

/// Diff one dataset between two snapshots; either side may be absent
///
/// # Errors
///
/// Propagates object store failures and undecodable blobs.
pub fn diff_datasets<S: ObjectStore + ?Sized>(
    store: &S,
    old: Option<&Dataset>,
    new: Option<&Dataset>,
) -> ExResult<DatasetDiff> {
    let mut diff = DatasetDiff::default();
    if let (Some(o), Some(n)) = (old, new) {
        if o.tree_id == n.tree_id {
            return Ok(diff);
        }
    }

    let old_meta = match old {
        Some(ds) => ds.meta_blob_ids(store)?,
        None => BTreeMap::new(),
    };
    let new_meta = match new {
        Some(ds) => ds.meta_blob_ids(store)?,
        None => BTreeMap::new(),
    };
    let items: BTreeSet<&MetaItemName> = old_meta.keys().chain(new_meta.keys()).collect();
    for item in items {
        let change = match (old_meta.get(item), new_meta.get(item)) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), Some(b)) => ValueChange::Updated {
                old: item.decode(&store.read_blob(a)?)?,
                new: item.decode(&store.read_blob(b)?)?,
            },
            (Some(a), None) => ValueChange::Removed {
                old: item.decode(&store.read_blob(a)?)?,
            },
            (None, Some(b)) => ValueChange::Added {
                new: item.decode(&store.read_blob(b)?)?,
            },
            (None, None) => continue,
        };
        diff.meta.insert(item.clone(), change);
    }

    let old_features = match old {
        Some(ds) => ds.feature_tree_id(store)?,
        None => None,
    };
    let new_features = match new {
        Some(ds) => ds.feature_tree_id(store)?,
        None => None,
    };
    if old_features != new_features {
        diff.feature = diff_feature_trees(store, old_features.as_ref(), new_features.as_ref())?;
    }
    Ok(diff)
}

fn shard_ids<S: ObjectStore + ?Sized>(
    store: &S,
    tree: Option<&ObjectId>,
) -> ExResult<BTreeMap<String, (EntryKind, ObjectId)>> {
    let mut shards = BTreeMap::new();
    if let Some(tree) = tree {
        for entry in store.read_tree(tree)?.entries() {
            shards.insert(entry.name.clone(), (entry.kind, entry.id.clone()));
        }
    }
    Ok(shards)
}

fn diff_feature_trees<S: ObjectStore + ?Sized>(
    store: &S,
    old: Option<&ObjectId>,
    new: Option<&ObjectId>,
) -> ExResult<Vec<FeatureDelta>> {
    let old_shards = shard_ids(store, old)?;
    let new_shards = shard_ids(store, new)?;

    let mut old_blobs: BTreeMap<PrimaryKey, ObjectId> = BTreeMap::new();
    let mut new_blobs: BTreeMap<PrimaryKey, ObjectId> = BTreeMap::new();
    let shard_names: BTreeSet<&String> = old_shards.keys().chain(new_shards.keys()).collect();
    for shard in shard_names {
        let a = old_shards.get(shard);
        let b = new_shards.get(shard);
        if a == b {
            continue;
        }
        if let Some((EntryKind::Tree, id)) = a {
            old_blobs.extend(feature_blob_ids_in(store, id)?);
        }
        if let Some((EntryKind::Tree, id)) = b {
            new_blobs.extend(feature_blob_ids_in(store, id)?);
        }
    }

    let read = |id: &ObjectId| -> ExResult<Feature> { Ok(decode_feature(&store.read_blob(id)?)?) };

    let keys: BTreeSet<&PrimaryKey> = old_blobs.keys().chain(new_blobs.keys()).collect();
    let mut deltas = Vec::new();
    for pk in keys {
        let change = match (old_blobs.get(pk), new_blobs.get(pk)) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), Some(b)) => FeatureChange::Updated {
                old: read(a)?,
                new: read(b)?,
            },
            (Some(a), None) => FeatureChange::Deleted { old: read(a)? },
            (None, Some(b)) => FeatureChange::Inserted { new: read(b)? },
            (None, None) => continue,
        };
        deltas.push(FeatureDelta {
            pk: pk.clone(),
            change,
        });
    }
    Ok(deltas)
}

/// Diff two in-memory dataset states
///
/// # Errors
///
/// Returns `InvalidMetaItem` if either state holds an unrecognised meta item.
pub fn diff_states(old: &DatasetState, new: &DatasetState) -> Result<DatasetDiff> {
    let mut diff = DatasetDiff::default();

    let names: BTreeSet<&String> = old.meta.keys().chain(new.meta.keys()).collect();
    for name in names {
        let change = match (old.meta.get(name), new.meta.get(name)) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), Some(b)) => ValueChange::Updated {
                old: a.clone(),
                new: b.clone(),
            },
            (Some(a), None) => ValueChange::Removed { old: a.clone() },
            (None, Some(b)) => ValueChange::Added { new: b.clone() },
            (None, None) => continue,
        };
        diff.meta.insert(MetaItemName::parse_required(name)?, change);
    }

    let keys: BTreeSet<&PrimaryKey> = old.features.keys().chain(new.features.keys()).collect();
    for pk in keys {
        let change = match (old.features.get(pk), new.features.get(pk)) {
            (Some(a), Some(b)) if a == b => continue,
            (Some(a), Some(b)) => FeatureChange::Updated {
                old: a.clone(),
                new: b.clone(),
            },
            (Some(a), None) => FeatureChange::Deleted { old: a.clone() },
            (None, Some(b)) => FeatureChange::Inserted { new: b.clone() },
            (None, None) => continue,
        };
        diff.feature.push(FeatureDelta {
            pk: pk.clone(),
            change,
        });
    }
    Ok(diff)
}
