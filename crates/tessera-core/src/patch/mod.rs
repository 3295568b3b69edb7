//! Patch documents: parsing, validation against a snapshot, and emission.
//!
//! A patch is a JSON object with two required keys:
//!
//! ```json
//! {
//!   "tessera.diff/v1+hexwkb": {"<dataset>": {"meta": {...}, "feature": [...]}},
//!   "tessera.patch/v1": {"message": "...", "authorName": "...", ...}
//! }
//! ```
//!
//! Parsing only checks the document shape. The per-dataset diffs are decoded
//! by [`Patch::resolve`] once the target snapshot is known, because feature
//! primary keys depend on each dataset's schema.

pub mod header;

pub use header::PatchHeader;

use crate::dataset::{Dataset, MetaItemName, Schema};
use crate::diff::wire::{decode_features, decode_meta, encode_repo_diff};
use crate::diff::{DatasetDiff, PatchType, RepoDiff, ValueChange, DIFF_KEY, HEADER_KEY};
use crate::errors::{ExError, ExErrorKind, ExResult, Result, TesseraError};
use crate::object::{ObjectId, ObjectStore};
use serde_json::{Map, Value};

/// A parsed patch whose diff has not yet been checked against a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub header: PatchHeader,
    datasets: Map<String, Value>,
}

fn invalid(reason: impl Into<String>) -> TesseraError {
    TesseraError::InvalidPatch {
        reason: reason.into(),
    }
}

/// Parse a patch document
///
/// # Errors
///
/// Returns `InvalidPatch` if the bytes are not JSON, or a required key is
/// missing or of the wrong shape, and `InvalidTimestamp` for a header time
/// or offset that does not parse.
pub fn parse_patch(bytes: &[u8]) -> Result<Patch> {
    let document: Value = serde_json::from_slice(bytes).map_err(|err| {
        tracing::debug!(error = %err, "patch is not valid JSON");
        invalid("Failed to parse JSON patch file")
    })?;
    let Value::Object(mut document) = document else {
        return Err(invalid("Failed to parse JSON patch file"));
    };
    let malformed = |detail: String| invalid(format!("Failed to parse JSON patch file: {}", detail));

    let datasets = match document.remove(DIFF_KEY) {
        Some(Value::Object(datasets)) => datasets,
        Some(_) => return Err(malformed(format!("'{}' must be an object", DIFF_KEY))),
        None => return Err(malformed(format!("missing required key '{}'", DIFF_KEY))),
    };
    let header = match document.remove(HEADER_KEY) {
        Some(value) => serde_json::from_value::<PatchHeader>(value)
            .map_err(|err| malformed(format!("invalid '{}': {}", HEADER_KEY, err)))?,
        None => return Err(malformed(format!("missing required key '{}'", HEADER_KEY))),
    };
    header.validate()?;

    Ok(Patch { header, datasets })
}

impl Patch {
    /// Names of every dataset the patch touches, sorted
    pub fn dataset_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.datasets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode the diff against the snapshot tree `root`
    ///
    /// Every dataset must exist in `root`. Feature keys are extracted using
    /// the schema the dataset will have after the patch: the patched
    /// `schema.json` when the patch changes it, the current one otherwise.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDataset` naming the first missing dataset before any
    /// decoding happens, or `InvalidPatch` for malformed dataset diffs.
    pub fn resolve<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        root: &ObjectId,
    ) -> ExResult<RepoDiff> {
        let mut found = Vec::with_capacity(self.datasets.len());
        for name in self.dataset_names() {
            match Dataset::open(store, root, name)? {
                Some(dataset) => found.push(dataset),
                None => {
                    return Err(ExError::new(ExErrorKind::UnknownDataset)
                        .with_dataset(name)
                        .with_message(format!(
                            "Patch contains changes for dataset '{}' which is not in this repository",
                            name
                        )));
                }
            }
        }

        let mut diff = RepoDiff::default();
        for dataset in found {
            let raw = self.datasets.get(&dataset.name).unwrap_or(&Value::Null);
            if !raw.is_object() {
                return Err(ExError::from(invalid(format!(
                    "{}: dataset diff must be an object",
                    dataset.name
                )))
                .with_dataset(&dataset.name));
            }
            let decoded = decode_dataset(store, &dataset, raw)
                .map_err(|err| err.with_dataset(&dataset.name))?;
            diff.insert(dataset.name.clone(), decoded);
        }
        Ok(diff)
    }
}

fn decode_dataset<S: ObjectStore + ?Sized>(
    store: &S,
    dataset: &Dataset,
    raw: &Value,
) -> ExResult<DatasetDiff> {
    let meta = decode_meta(&dataset.name, raw)?;
    let schema = match meta.get(&MetaItemName::Schema) {
        Some(ValueChange::Removed { .. }) => {
            return Err(invalid(format!("{}: schema.json cannot be removed", dataset.name)).into());
        }
        Some(change) => match change.new_value() {
            Some(value) => Schema::from_value(&dataset.name, value)
                .map_err(|err| invalid(err.to_string()))?,
            None => dataset.schema(store)?,
        },
        None => dataset.schema(store)?,
    };
    let feature = decode_features(&dataset.name, raw, &schema)?;
    Ok(DatasetDiff { meta, feature })
}

/// Build a patch document for `diff`
pub fn patch_document(header: &PatchHeader, diff: &RepoDiff, patch_type: PatchType) -> ExResult<Value> {
    let mut document = Map::new();
    document.insert(DIFF_KEY.to_string(), encode_repo_diff(diff, patch_type));
    document.insert(HEADER_KEY.to_string(), serde_json::to_value(header)?);
    Ok(Value::Object(document))
}
