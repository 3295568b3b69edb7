//! JSON wire format for diffs exchanged in patch files.
//!
//! ```json
//! {
//!   "meta": {"title": {"-": "Old", "+": "New"}},
//!   "feature": [
//!     {"-": {"fid": 1, "geom": "0101..."}, "+": {"fid": 1, "geom": "0101..."}},
//!     {"+": {"fid": 2, "geom": null}},
//!     {"*": {"fid": 3, "geom": null}}
//!   ]
//! }
//! ```
//!
//! `-` carries the asserted old value, `+` the new value and `*` a new value
//! with no assertion about the old one. The tags are decoded here into
//! [`ValueChange`] and [`FeatureChange`] and never looked at again.

use super::model::{DatasetDiff, FeatureChange, FeatureDelta, RepoDiff, ValueChange};
use crate::dataset::{Feature, MetaItemName, Schema};
use crate::errors::{Result, TesseraError};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Top-level key holding the per-dataset diffs
pub const DIFF_KEY: &str = "tessera.diff/v1+hexwkb";
/// Top-level key holding the patch header
pub const HEADER_KEY: &str = "tessera.patch/v1";

const OLD_TAG: &str = "-";
const NEW_TAG: &str = "+";
const UNCONDITIONAL_TAG: &str = "*";

/// How much prior state an encoded patch asserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchType {
    /// Updates carry both old and new values
    #[default]
    Full,
    /// Updates carry only the new value
    Minimal,
}

enum Tagged {
    Update(Value, Value),
    Add(Value),
    Remove(Value),
    Unconditional(Value),
}

fn invalid(reason: String) -> TesseraError {
    TesseraError::InvalidPatch { reason }
}

fn decode_tags(value: &Value, context: &str) -> Result<Tagged> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid(format!("{}: change must be an object", context)))?;
    let keys: BTreeSet<&str> = object.keys().map(String::as_str).collect();
    let get = |tag: &str| object.get(tag).cloned().unwrap_or(Value::Null);

    let tagged = if keys == BTreeSet::from([OLD_TAG, NEW_TAG]) {
        Tagged::Update(get(OLD_TAG), get(NEW_TAG))
    } else if keys == BTreeSet::from([NEW_TAG]) {
        Tagged::Add(get(NEW_TAG))
    } else if keys == BTreeSet::from([OLD_TAG]) {
        Tagged::Remove(get(OLD_TAG))
    } else if keys == BTreeSet::from([UNCONDITIONAL_TAG]) {
        Tagged::Unconditional(get(UNCONDITIONAL_TAG))
    } else {
        return Err(invalid(format!(
            "{}: expected '-' and/or '+', or '*' alone, got {:?}",
            context, keys
        )));
    };
    Ok(tagged)
}

fn tag(pairs: &[(&str, Value)]) -> Value {
    let mut object = Map::new();
    for (key, value) in pairs {
        object.insert((*key).to_string(), value.clone());
    }
    Value::Object(object)
}

pub fn encode_value_change(change: &ValueChange, patch_type: PatchType) -> Value {
    match (change, patch_type) {
        (ValueChange::Updated { new, .. }, PatchType::Minimal) => {
            tag(&[(UNCONDITIONAL_TAG, new.clone())])
        }
        (ValueChange::Updated { old, new }, PatchType::Full) => {
            tag(&[(OLD_TAG, old.clone()), (NEW_TAG, new.clone())])
        }
        (ValueChange::Added { new }, _) => tag(&[(NEW_TAG, new.clone())]),
        (ValueChange::Removed { old }, _) => tag(&[(OLD_TAG, old.clone())]),
        (ValueChange::SetUnconditional { new }, _) => tag(&[(UNCONDITIONAL_TAG, new.clone())]),
    }
}

pub fn encode_feature_change(change: &FeatureChange, patch_type: PatchType) -> Value {
    let obj = |f: &Feature| Value::Object(f.clone());
    match (change, patch_type) {
        (FeatureChange::Updated { new, .. }, PatchType::Minimal) => {
            tag(&[(UNCONDITIONAL_TAG, obj(new))])
        }
        (FeatureChange::Updated { old, new }, PatchType::Full) => {
            tag(&[(OLD_TAG, obj(old)), (NEW_TAG, obj(new))])
        }
        (FeatureChange::Inserted { new }, _) => tag(&[(NEW_TAG, obj(new))]),
        (FeatureChange::Deleted { old }, _) => tag(&[(OLD_TAG, obj(old))]),
        (FeatureChange::SetUnconditional { new }, _) => tag(&[(UNCONDITIONAL_TAG, obj(new))]),
    }
}

pub fn encode_dataset_diff(diff: &DatasetDiff, patch_type: PatchType) -> Value {
    let mut object = Map::new();
    if !diff.meta.is_empty() {
        let meta: Map<String, Value> = diff
            .meta
            .iter()
            .map(|(item, change)| (item.as_name(), encode_value_change(change, patch_type)))
            .collect();
        object.insert("meta".to_string(), Value::Object(meta));
    }
    if !diff.feature.is_empty() {
        let features: Vec<Value> = diff
            .feature
            .iter()
            .map(|delta| encode_feature_change(&delta.change, patch_type))
            .collect();
        object.insert("feature".to_string(), Value::Array(features));
    }
    Value::Object(object)
}

/// Encode every dataset diff into the value stored under [`DIFF_KEY`]
pub fn encode_repo_diff(diff: &RepoDiff, patch_type: PatchType) -> Value {
    Value::Object(
        diff.datasets
            .iter()
            .map(|(name, ds)| (name.clone(), encode_dataset_diff(ds, patch_type)))
            .collect(),
    )
}

/// Decode the `meta` section of one dataset diff (absent means empty)
///
/// # Errors
///
/// Returns `InvalidPatch` for malformed changes and `InvalidMetaItem` for
/// unrecognised item names.
pub fn decode_meta(dataset: &str, value: &Value) -> Result<BTreeMap<MetaItemName, ValueChange>> {
    let mut meta = BTreeMap::new();
    let Some(section) = value.get("meta") else {
        return Ok(meta);
    };
    let section = section
        .as_object()
        .ok_or_else(|| invalid(format!("{}: 'meta' must be an object", dataset)))?;
    for (name, raw) in section {
        let item = MetaItemName::parse_required(name)?;
        let context = format!("{}:meta:{}", dataset, name);
        let change = match decode_tags(raw, &context)? {
            Tagged::Update(old, new) => ValueChange::Updated { old, new },
            Tagged::Add(new) => ValueChange::Added { new },
            Tagged::Remove(old) => ValueChange::Removed { old },
            Tagged::Unconditional(new) => ValueChange::SetUnconditional { new },
        };
        for v in [change.old(), change.new_value()].into_iter().flatten() {
            // Rejects non-string values for text items
            item.encode(v)?;
        }
        meta.insert(item, change);
    }
    Ok(meta)
}

fn as_feature(value: Value, context: &str) -> Result<Feature> {
    match value {
        Value::Object(feature) => Ok(feature),
        _ => Err(invalid(format!("{}: feature must be an object", context))),
    }
}

/// Decode the `feature` section of one dataset diff (absent means empty)
///
/// Primary keys are taken from the features themselves using `schema`.
///
/// # Errors
///
/// Returns `InvalidPatch` for malformed changes, a primary key that differs
/// between old and new, or a primary key changed twice; `InvalidPrimaryKey`
/// and `InvalidGeometry` for features that do not fit `schema`.
pub fn decode_features(dataset: &str, value: &Value, schema: &Schema) -> Result<Vec<FeatureDelta>> {
    let mut deltas = Vec::new();
    let Some(section) = value.get("feature") else {
        return Ok(deltas);
    };
    let section = section
        .as_array()
        .ok_or_else(|| invalid(format!("{}: 'feature' must be an array", dataset)))?;

    let mut seen = BTreeSet::new();
    for (index, raw) in section.iter().enumerate() {
        let context = format!("{}:feature[{}]", dataset, index);
        let change = match decode_tags(raw, &context)? {
            Tagged::Update(old, new) => FeatureChange::Updated {
                old: as_feature(old, &context)?,
                new: as_feature(new, &context)?,
            },
            Tagged::Add(new) => FeatureChange::Inserted {
                new: as_feature(new, &context)?,
            },
            Tagged::Remove(old) => FeatureChange::Deleted {
                old: as_feature(old, &context)?,
            },
            Tagged::Unconditional(new) => FeatureChange::SetUnconditional {
                new: as_feature(new, &context)?,
            },
        };

        let mut pk = None;
        for feature in [change.old(), change.new_value()].into_iter().flatten() {
            schema.validate_feature(dataset, feature)?;
            let key = schema.primary_key_of(dataset, feature)?;
            if pk.as_ref().is_some_and(|existing| existing != &key) {
                return Err(invalid(format!(
                    "{}: primary key differs between old and new values",
                    context
                )));
            }
            pk = Some(key);
        }
        let pk = pk.ok_or_else(|| invalid(format!("{}: empty change", context)))?;
        if !seen.insert(pk.clone()) {
            return Err(invalid(format!(
                "{}:feature:{}: more than one change for this feature",
                dataset, pk
            )));
        }
        deltas.push(FeatureDelta { pk, change });
    }
    Ok(deltas)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dataset::PrimaryKey;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_value(
            "ds",
            &json!([
                {"name": "fid", "dataType": "integer", "primaryKeyIndex": 0},
                {"name": "geom", "dataType": "geometry"}
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_tags_decode_to_variants() {
        let raw = json!({"meta": {
            "title": {"-": "Old", "+": "New"},
            "description": {"+": "d"},
            "metadata.xml": {"-": "<x/>"},
            "crs/EPSG:4326.wkt": {"*": "GEOGCS[]"}
        }});
        let meta = decode_meta("ds", &raw).unwrap();
        assert_eq!(
            meta[&MetaItemName::Title],
            ValueChange::Updated {
                old: json!("Old"),
                new: json!("New")
            }
        );
        assert!(matches!(meta[&MetaItemName::Description], ValueChange::Added { .. }));
        assert!(matches!(meta[&MetaItemName::MetadataXml], ValueChange::Removed { .. }));
        assert!(matches!(
            meta[&MetaItemName::Crs("EPSG:4326".to_string())],
            ValueChange::SetUnconditional { .. }
        ));
    }

    #[test]
    fn test_bad_tag_combinations_rejected() {
        for bad in [
            json!({"meta": {"title": {"*": "a", "+": "b"}}}),
            json!({"meta": {"title": {}}}),
            json!({"meta": {"title": {"x": "a"}}}),
            json!({"meta": {"title": "New"}}),
            json!({"meta": {"title": {"+": 5}}}),
            json!({"meta": {"favourite-colour": {"+": "blue"}}}),
            json!({"meta": []}),
        ] {
            assert!(decode_meta("ds", &bad).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_features_decode_with_keys() {
        let raw = json!({"feature": [
            {"-": {"fid": 1, "geom": null}, "+": {"fid": 1, "geom": "0101"}},
            {"+": {"fid": 123456, "geom": null}},
            {"*": {"fid": 7, "geom": null}}
        ]});
        let deltas = decode_features("ds", &raw, &schema()).unwrap();
        let pks: Vec<PrimaryKey> = deltas.iter().map(|d| d.pk.clone()).collect();
        assert_eq!(
            pks,
            vec![PrimaryKey::Int(1), PrimaryKey::Int(123456), PrimaryKey::Int(7)]
        );
        assert!(matches!(deltas[2].change, FeatureChange::SetUnconditional { .. }));
    }

    #[test]
    fn test_duplicate_primary_key_rejected() {
        let raw = json!({"feature": [
            {"+": {"fid": 1, "geom": null}},
            {"-": {"fid": 1, "geom": null}}
        ]});
        let err = decode_features("ds", &raw, &schema()).unwrap_err();
        assert!(err.to_string().contains("more than one change"));
    }

    #[test]
    fn test_changed_primary_key_rejected() {
        let raw = json!({"feature": [
            {"-": {"fid": 1, "geom": null}, "+": {"fid": 2, "geom": null}}
        ]});
        assert!(decode_features("ds", &raw, &schema()).is_err());
    }

    #[test]
    fn test_non_hex_geometry_rejected() {
        let raw = json!({"feature": [{"+": {"fid": 1, "geom": "POINT(0 0)"}}]});
        let err = decode_features("ds", &raw, &schema()).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_minimal_encoding_drops_old_values_of_updates_only() {
        let mut diff = DatasetDiff::default();
        diff.meta.insert(
            MetaItemName::Title,
            ValueChange::Updated {
                old: json!("Old"),
                new: json!("New"),
            },
        );
        diff.meta.insert(
            MetaItemName::Description,
            ValueChange::Removed { old: json!("d") },
        );

        let full = encode_dataset_diff(&diff, PatchType::Full);
        assert_eq!(full["meta"]["title"], json!({"-": "Old", "+": "New"}));

        let minimal = encode_dataset_diff(&diff, PatchType::Minimal);
        assert_eq!(minimal["meta"]["title"], json!({"*": "New"}));
        assert_eq!(minimal["meta"]["description"], json!({"-": "d"}));
        assert!(minimal.get("feature").is_none());
    }

    #[test]
    fn test_encoded_diff_decodes_to_itself() {
        let raw = json!({
            "meta": {"title": {"-": "Old", "+": "New"}},
            "feature": [
                {"-": {"fid": 1, "geom": null}},
                {"+": {"fid": 2, "geom": "00"}}
            ]
        });
        let diff = DatasetDiff {
            meta: decode_meta("ds", &raw).unwrap(),
            feature: decode_features("ds", &raw, &schema()).unwrap(),
        };
        assert_eq!(encode_dataset_diff(&diff, PatchType::Full), raw);
    }
}
