//! Datasets stored inside a snapshot tree.
//!
//! A dataset named `a/b` lives at `a/b/.table-dataset/` with two
//! subdirectories:
//!
//! ```text
//! a/b/.table-dataset/
//!   meta/<item name>             title, schema.json, crs/EPSG:2193.wkt, ...
//!   feature/<shard>/<encoded pk> one JSON blob per feature
//! ```

pub mod feature;
pub mod meta;
pub mod schema;

pub use feature::{decode_feature, encode_feature, Feature, PrimaryKey};
pub use meta::{MetaFormat, MetaItemName};
pub use schema::{Column, Schema};

use crate::errors::{ExResult, TesseraError};
use crate::object::{EntryKind, ObjectId, ObjectStore};
use crate::tree::{get_path, join_path, walk_tree, TreeBuilder, WalkOrder};
use serde_json::Value;
use std::collections::BTreeMap;

/// Directory marking a dataset root
pub const DATASET_DIRNAME: &str = ".table-dataset";
pub const META_DIRNAME: &str = "meta";
pub const FEATURE_DIRNAME: &str = "feature";

/// A dataset as found in one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub name: String,
    /// Id of the `.table-dataset` tree
    pub tree_id: ObjectId,
}

/// A dataset fully read into memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetState {
    pub meta: BTreeMap<String, Value>,
    pub features: BTreeMap<PrimaryKey, Feature>,
}

/// Find every dataset in the snapshot tree `root`
///
/// # Errors
///
/// Propagates object store failures.
pub fn find_datasets<S: ObjectStore + ?Sized>(
    store: &S,
    root: &ObjectId,
) -> ExResult<BTreeMap<String, Dataset>> {
    let mut found = BTreeMap::new();
    walk_tree(store, root, "", WalkOrder::PreOrder).visit(|entry| {
        if !entry.path.is_empty() {
            if let Some(marker) = entry.tree.get(DATASET_DIRNAME) {
                if marker.kind == EntryKind::Tree {
                    found.insert(
                        entry.path.clone(),
                        Dataset {
                            name: entry.path.clone(),
                            tree_id: marker.id.clone(),
                        },
                    );
                    // datasets do not nest
                    entry.subtree_names.clear();
                    return Ok(());
                }
            }
        }
        entry.subtree_names.retain(|name| !name.starts_with('.'));
        Ok(())
    })?;
    tracing::debug!(root = %root, count = found.len(), "found datasets");
    Ok(found)
}

impl Dataset {
    /// Look up a single dataset by name
    ///
    /// # Errors
    ///
    /// Propagates object store failures.
    pub fn open<S: ObjectStore + ?Sized>(
        store: &S,
        root: &ObjectId,
        name: &str,
    ) -> ExResult<Option<Dataset>> {
        let path = join_path(name, DATASET_DIRNAME);
        Ok(get_path(store, root, &path)?
            .filter(|e| e.kind == EntryKind::Tree)
            .map(|e| Dataset {
                name: name.to_string(),
                tree_id: e.id,
            }))
    }

    /// Full repository path of a path relative to the dataset root
    pub fn full_path(&self, relative: &str) -> String {
        full_path(&self.name, relative)
    }

    /// # Errors
    ///
    /// Propagates object store failures and undecodable item bytes.
    pub fn get_meta_item<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        item: &MetaItemName,
    ) -> ExResult<Option<Value>> {
        let path = meta_path(item);
        match get_path(store, &self.tree_id, &path)? {
            Some(entry) if entry.kind == EntryKind::Blob => {
                let bytes = store.read_blob(&entry.id)?;
                Ok(Some(item.decode(&bytes)?))
            }
            _ => Ok(None),
        }
    }

    /// Blob ids of every meta item present, keyed by item name
    ///
    /// # Errors
    ///
    /// Propagates object store failures.
    pub fn meta_blob_ids<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
    ) -> ExResult<BTreeMap<MetaItemName, ObjectId>> {
        let mut ids = BTreeMap::new();
        let Some(meta) = get_path(store, &self.tree_id, META_DIRNAME)? else {
            return Ok(ids);
        };
        if meta.kind != EntryKind::Tree {
            return Ok(ids);
        }
        walk_tree(store, &meta.id, "", WalkOrder::PreOrder).visit(|entry| {
            for blob in &entry.blob_names {
                let name = join_path(&entry.path, blob);
                // Unrecognised files are not meta items of this dataset kind
                if let Some(item) = MetaItemName::parse(&name) {
                    if let Some(e) = entry.tree.get(blob) {
                        ids.insert(item, e.id.clone());
                    }
                }
            }
            Ok(())
        })?;
        Ok(ids)
    }

    /// Every meta item present, keyed by item name
    ///
    /// # Errors
    ///
    /// Propagates object store failures and undecodable item bytes.
    pub fn meta_items<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
    ) -> ExResult<BTreeMap<String, Value>> {
        let mut items = BTreeMap::new();
        for (item, id) in self.meta_blob_ids(store)? {
            let value = item.decode(&store.read_blob(&id)?)?;
            items.insert(item.as_name(), value);
        }
        Ok(items)
    }

    /// # Errors
    ///
    /// Returns `InvalidSchema` if `schema.json` is missing or malformed.
    pub fn schema<S: ObjectStore + ?Sized>(&self, store: &S) -> ExResult<Schema> {
        let value = self
            .get_meta_item(store, &MetaItemName::Schema)?
            .ok_or_else(|| TesseraError::InvalidSchema {
                dataset: self.name.clone(),
                reason: "schema.json is missing".to_string(),
            })?;
        Ok(Schema::from_value(&self.name, &value)?)
    }

    /// # Errors
    ///
    /// Propagates object store failures and undecodable feature blobs.
    pub fn get_feature<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        pk: &PrimaryKey,
    ) -> ExResult<Option<Feature>> {
        let path = join_path(FEATURE_DIRNAME, &pk.feature_path());
        match get_path(store, &self.tree_id, &path)? {
            Some(entry) if entry.kind == EntryKind::Blob => {
                Ok(Some(decode_feature(&store.read_blob(&entry.id)?)?))
            }
            _ => Ok(None),
        }
    }

    /// Id of the `feature/` tree, if the dataset has any features
    ///
    /// # Errors
    ///
    /// Propagates object store failures.
    pub fn feature_tree_id<S: ObjectStore + ?Sized>(&self, store: &S) -> ExResult<Option<ObjectId>> {
        Ok(get_path(store, &self.tree_id, FEATURE_DIRNAME)?
            .filter(|e| e.kind == EntryKind::Tree)
            .map(|e| e.id))
    }

    /// Blob ids of every feature, keyed by primary key
    ///
    /// # Errors
    ///
    /// Propagates object store failures; `CorruptObject` for a feature blob
    /// whose name is not an encoded key.
    pub fn feature_blob_ids<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
    ) -> ExResult<BTreeMap<PrimaryKey, ObjectId>> {
        match self.feature_tree_id(store)? {
            Some(tree) => feature_blob_ids_in(store, &tree),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Every feature, keyed by primary key
    ///
    /// # Errors
    ///
    /// As [`Dataset::feature_blob_ids`], plus undecodable feature blobs.
    pub fn features<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
    ) -> ExResult<BTreeMap<PrimaryKey, Feature>> {
        let mut features = BTreeMap::new();
        for (pk, id) in self.feature_blob_ids(store)? {
            features.insert(pk, decode_feature(&store.read_blob(&id)?)?);
        }
        Ok(features)
    }

    /// Read the whole dataset into memory
    ///
    /// # Errors
    ///
    /// As [`Dataset::meta_items`] and [`Dataset::features`].
    pub fn state<S: ObjectStore + ?Sized>(&self, store: &S) -> ExResult<DatasetState> {
        Ok(DatasetState {
            meta: self.meta_items(store)?,
            features: self.features(store)?,
        })
    }
}

/// Blob ids of every feature below a `feature/` tree (or one of its shards)
///
/// # Errors
///
/// As [`Dataset::feature_blob_ids`].
pub fn feature_blob_ids_in<S: ObjectStore + ?Sized>(
    store: &S,
    tree: &ObjectId,
) -> ExResult<BTreeMap<PrimaryKey, ObjectId>> {
    let mut ids = BTreeMap::new();
    walk_tree(store, tree, "", WalkOrder::PreOrder).visit(|entry| {
        for e in entry.tree.entries() {
            if e.kind == EntryKind::Blob {
                ids.insert(PrimaryKey::decode(&e.name)?, e.id.clone());
            }
        }
        Ok(())
    })?;
    Ok(ids)
}

/// Repository path of `relative` inside dataset `name`
pub fn full_path(name: &str, relative: &str) -> String {
    format!("{}/{}/{}", name, DATASET_DIRNAME, relative)
}

/// Dataset-relative path of a meta item
pub fn meta_path(item: &MetaItemName) -> String {
    join_path(META_DIRNAME, &item.as_name())
}

/// Dataset-relative path of a feature
pub fn feature_path(pk: &PrimaryKey) -> String {
    join_path(FEATURE_DIRNAME, &pk.feature_path())
}

/// Stage a whole dataset into `builder`, e.g. when importing fixtures
///
/// Features are keyed by the primary key the schema extracts, not by the
/// map key in `state`.
///
/// # Errors
///
/// Returns `InvalidMetaItem` for unknown meta item names, `InvalidSchema`
/// when the schema is missing, or a store failure.
pub fn write_dataset<S: ObjectStore + ?Sized>(
    builder: &mut TreeBuilder<'_, S>,
    name: &str,
    state: &DatasetState,
) -> ExResult<()> {
    let schema_value =
        state
            .meta
            .get("schema.json")
            .ok_or_else(|| TesseraError::InvalidSchema {
                dataset: name.to_string(),
                reason: "schema.json is missing".to_string(),
            })?;
    let schema = Schema::from_value(name, schema_value)?;

    for (item_name, value) in &state.meta {
        let item = MetaItemName::parse_required(item_name)?;
        builder.insert_blob(&full_path(name, &meta_path(&item)), &item.encode(value)?)?;
    }
    for feature in state.features.values() {
        schema.validate_feature(name, feature)?;
        let pk = schema.primary_key_of(name, feature)?;
        builder.insert_blob(&full_path(name, &feature_path(&pk)), &encode_feature(feature)?)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::object::MemoryObjectStore;
    use serde_json::json;

    fn sample_state() -> DatasetState {
        let mut state = DatasetState::default();
        state.meta.insert("title".to_string(), json!("Points"));
        state.meta.insert(
            "schema.json".to_string(),
            json!([
                {"name": "fid", "dataType": "integer", "primaryKeyIndex": 0},
                {"name": "geom", "dataType": "geometry"},
                {"name": "name", "dataType": "text"}
            ]),
        );
        state
            .meta
            .insert("crs/EPSG:4326.wkt".to_string(), json!("GEOGCS[...]"));
        for fid in 1..=3 {
            let feature: Feature = serde_json::from_value(
                json!({"fid": fid, "geom": "0101000000", "name": format!("p{}", fid)}),
            )
            .unwrap();
            state.features.insert(PrimaryKey::Int(fid), feature);
        }
        state
    }

    fn build(store: &MemoryObjectStore) -> ObjectId {
        let mut builder = TreeBuilder::new(store, None);
        write_dataset(&mut builder, "nz/points", &sample_state()).unwrap();
        write_dataset(&mut builder, "lines", &sample_state()).unwrap();
        builder.insert_blob("README", b"not a dataset").unwrap();
        builder.write().unwrap()
    }

    #[test]
    fn test_find_datasets() {
        let store = MemoryObjectStore::new();
        let root = build(&store);
        let found = find_datasets(&store, &root).unwrap();
        assert_eq!(
            found.keys().cloned().collect::<Vec<_>>(),
            vec!["lines".to_string(), "nz/points".to_string()]
        );
    }

    #[test]
    fn test_state_round_trip() {
        let store = MemoryObjectStore::new();
        let root = build(&store);
        let ds = Dataset::open(&store, &root, "nz/points").unwrap().unwrap();
        assert_eq!(ds.state(&store).unwrap(), sample_state());
    }

    #[test]
    fn test_point_lookups() {
        let store = MemoryObjectStore::new();
        let root = build(&store);
        let ds = Dataset::open(&store, &root, "lines").unwrap().unwrap();

        assert_eq!(
            ds.get_meta_item(&store, &MetaItemName::Title).unwrap(),
            Some(json!("Points"))
        );
        assert_eq!(
            ds.get_meta_item(&store, &MetaItemName::Description).unwrap(),
            None
        );
        let feature = ds.get_feature(&store, &PrimaryKey::Int(2)).unwrap().unwrap();
        assert_eq!(feature["name"], json!("p2"));
        assert!(ds.get_feature(&store, &PrimaryKey::Int(99)).unwrap().is_none());
        assert_eq!(ds.schema(&store).unwrap().pk_column(), "fid");
    }

    #[test]
    fn test_open_missing_dataset() {
        let store = MemoryObjectStore::new();
        let root = build(&store);
        assert!(Dataset::open(&store, &root, "nope").unwrap().is_none());
        assert!(Dataset::open(&store, &root, "README").unwrap().is_none());
    }

    #[test]
    fn test_write_rejects_bad_geometry() {
        let store = MemoryObjectStore::new();
        let mut state = sample_state();
        state.features.get_mut(&PrimaryKey::Int(1)).unwrap()["geom"] = json!("zz");
        let mut builder = TreeBuilder::new(&store, None);
        assert!(write_dataset(&mut builder, "ds", &state).is_err());
    }
}
