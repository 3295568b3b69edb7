//! Applying a decoded diff to a snapshot.
//!
//! Application runs in three passes over a [`RepoDiff`]:
//!
//! 1. [`evaluate_patch`] judges every change against the snapshot, collecting
//!    every conflict rather than stopping at the first.
//! 2. [`EvaluatedPatch::decide`] rejects the whole patch if anything
//!    conflicts, or reports an empty patch if nothing remains to apply.
//! 3. [`write_changes`] stages the resolved changes and writes the new tree.

pub mod conflict;
pub mod evaluate;

pub use conflict::{Conflict, ConflictItem, ConflictKind};
pub use evaluate::{evaluate_feature, evaluate_meta, Outcome};

use crate::dataset::{
    encode_feature, feature_path, full_path, meta_path, Dataset, DatasetState,
};
use crate::diff::{DatasetDiff, FeatureDelta, RepoDiff};
use crate::errors::{ExError, ExErrorKind, ExResult};
use crate::object::{ObjectId, ObjectStore};
use crate::tree::TreeBuilder;

/// Outcome of evaluating a whole patch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluatedPatch {
    /// Applied changes in resolved form
    pub applied: RepoDiff,
    pub noops: usize,
    /// Sorted by dataset, then item
    pub conflicts: Vec<Conflict>,
}

impl EvaluatedPatch {
    /// Reduce the outcomes to a single decision
    ///
    /// # Errors
    ///
    /// Returns `PatchDoesNotApply` carrying every conflict, or `NoChanges`
    /// when every change was a no-op.
    pub fn decide(self) -> ExResult<RepoDiff> {
        if !self.conflicts.is_empty() {
            return Err(ExError::new(ExErrorKind::PatchDoesNotApply)
                .with_message("Patch does not apply")
                .with_conflicts(self.conflicts));
        }
        if self.applied.is_empty() {
            return Err(ExError::new(ExErrorKind::NoChanges).with_message("No changes to commit"));
        }
        Ok(self.applied)
    }
}

/// Evaluate every change in `diff` against the snapshot tree `root`
///
/// # Errors
///
/// Returns `UnknownDataset` if a dataset is missing from `root`, or
/// propagates object store failures. Conflicts are not errors here.
pub fn evaluate_patch<S: ObjectStore + ?Sized>(
    store: &S,
    root: &ObjectId,
    diff: &RepoDiff,
) -> ExResult<EvaluatedPatch> {
    let mut result = EvaluatedPatch::default();

    for (name, ds_diff) in &diff.datasets {
        let dataset = Dataset::open(store, root, name)?.ok_or_else(|| {
            ExError::new(ExErrorKind::UnknownDataset)
                .with_dataset(name)
                .with_message(format!(
                    "Patch contains changes for dataset '{}' which is not in this repository",
                    name
                ))
        })?;

        let mut applied = DatasetDiff::default();
        for (item, change) in &ds_diff.meta {
            let current = dataset.get_meta_item(store, item)?;
            match evaluate_meta(change, current.as_ref()) {
                Outcome::Applied(resolved) => {
                    applied.meta.insert(item.clone(), resolved);
                }
                Outcome::NoOp => result.noops += 1,
                Outcome::Conflict(kind) => result.conflicts.push(Conflict {
                    dataset: name.clone(),
                    item: ConflictItem::Meta(item.clone()),
                    kind,
                }),
            }
        }
        for delta in &ds_diff.feature {
            let current = dataset.get_feature(store, &delta.pk)?;
            match evaluate_feature(&delta.change, current.as_ref()) {
                Outcome::Applied(resolved) => applied.feature.push(FeatureDelta {
                    pk: delta.pk.clone(),
                    change: resolved,
                }),
                Outcome::NoOp => result.noops += 1,
                Outcome::Conflict(kind) => result.conflicts.push(Conflict {
                    dataset: name.clone(),
                    item: ConflictItem::Feature(delta.pk.clone()),
                    kind,
                }),
            }
        }
        applied.sort_features();
        result.applied.insert(name.clone(), applied);
    }

    result
        .conflicts
        .sort_by(|a, b| (&a.dataset, &a.item).cmp(&(&b.dataset, &b.item)));
    tracing::debug!(
        applied = result.applied.change_count(),
        noops = result.noops,
        conflicts = result.conflicts.len(),
        "evaluated patch"
    );
    Ok(result)
}

/// Stage resolved changes into `builder`
///
/// # Errors
///
/// Returns `InvalidPatch` if a meta value cannot be encoded, or a store
/// failure.
pub fn stage_changes<S: ObjectStore + ?Sized>(
    builder: &mut TreeBuilder<'_, S>,
    diff: &RepoDiff,
) -> ExResult<()> {
    for (name, ds_diff) in &diff.datasets {
        for (item, change) in &ds_diff.meta {
            let path = full_path(name, &meta_path(item));
            match change.new_value() {
                Some(value) => {
                    builder.insert_blob(&path, &item.encode(value)?)?;
                }
                None => builder.remove(&path)?,
            }
        }
        for delta in &ds_diff.feature {
            let path = full_path(name, &feature_path(&delta.pk));
            match delta.change.new_value() {
                Some(feature) => {
                    builder.insert_blob(&path, &encode_feature(feature)?)?;
                }
                None => builder.remove(&path)?,
            }
        }
    }
    Ok(())
}

/// Write resolved changes on top of `root`, returning the new tree id
///
/// # Errors
///
/// As [`stage_changes`].
pub fn write_changes<S: ObjectStore + ?Sized>(
    store: &S,
    root: &ObjectId,
    diff: &RepoDiff,
) -> ExResult<ObjectId> {
    let mut builder = TreeBuilder::new(store, Some(root.clone()));
    stage_changes(&mut builder, diff)?;
    builder.write()
}

/// Apply a resolved dataset diff to an in-memory state
pub fn apply_to_state(state: &mut DatasetState, diff: &DatasetDiff) {
    for (item, change) in &diff.meta {
        match change.new_value() {
            Some(value) => {
                state.meta.insert(item.as_name(), value.clone());
            }
            None => {
                state.meta.remove(&item.as_name());
            }
        }
    }
    for delta in &diff.feature {
        match delta.change.new_value() {
            Some(feature) => {
                state.features.insert(delta.pk.clone(), feature.clone());
            }
            None => {
                state.features.remove(&delta.pk);
            }
        }
    }
}
