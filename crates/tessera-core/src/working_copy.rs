//! Working copy port.
//!
//! A working copy materialises the datasets of one snapshot (its base) in an
//! editable form. History moves it with [`WorkingCopy::sync_to`]; a
//! no-commit apply edits it with [`WorkingCopy::apply_changes`] and leaves
//! the base alone.

use crate::apply::apply_to_state;
use crate::dataset::{find_datasets, DatasetState};
use crate::diff::{diff_states, RepoDiff};
use crate::errors::{ExError, ExErrorKind, ExResult};
use crate::object::{ObjectId, ObjectStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

pub trait WorkingCopy {
    /// Tree the working copy was last synced to
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn base_tree(&self) -> ExResult<Option<ObjectId>>;

    /// Discard everything and materialise `tree` in full
    ///
    /// # Errors
    ///
    /// Returns an error when reading `tree` or the backing storage fails.
    fn reset(&self, store: &dyn ObjectStore, tree: &ObjectId) -> ExResult<()>;

    /// Materialise a resolved diff without moving the base
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn apply_changes(&self, diff: &RepoDiff) -> ExResult<()>;

    /// Materialise a resolved diff and move the base to `tree`
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn sync_to(&self, tree: &ObjectId, diff: &RepoDiff) -> ExResult<()>;

    /// Names of every materialised dataset
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn dataset_names(&self) -> ExResult<Vec<String>>;

    /// Materialised state of one dataset
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage fails.
    fn read_state(&self, dataset: &str) -> ExResult<Option<DatasetState>>;
}

/// Uncommitted changes: the diff from the base tree to the materialised state
///
/// # Errors
///
/// Returns `NoWorkingCopy` if the working copy was never synced, or
/// propagates store failures.
pub fn working_copy_status(
    store: &dyn ObjectStore,
    working_copy: &dyn WorkingCopy,
) -> ExResult<RepoDiff> {
    let base = working_copy.base_tree()?.ok_or_else(|| {
        ExError::new(ExErrorKind::NoWorkingCopy).with_message("Working copy has no base tree")
    })?;

    let committed = find_datasets(store, &base)?;
    let materialised = working_copy.dataset_names()?;
    let names: BTreeSet<&String> = committed.keys().chain(materialised.iter()).collect();

    let mut diff = RepoDiff::default();
    for name in names {
        let old = match committed.get(name) {
            Some(ds) => ds.state(store)?,
            None => DatasetState::default(),
        };
        let new = working_copy.read_state(name)?.unwrap_or_default();
        diff.insert(name.clone(), diff_states(&old, &new)?);
    }
    Ok(diff)
}

#[derive(Debug, Default)]
struct MemoryState {
    base: Option<ObjectId>,
    datasets: BTreeMap<String, DatasetState>,
}

/// Working copy held in process memory
#[derive(Debug, Default)]
pub struct MemoryWorkingCopy {
    inner: Mutex<MemoryState>,
}

impl MemoryWorkingCopy {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ExResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.inner.lock().map_err(|_| {
            ExError::new(ExErrorKind::Internal).with_message("working copy lock poisoned")
        })
    }
}

impl WorkingCopy for MemoryWorkingCopy {
    fn base_tree(&self) -> ExResult<Option<ObjectId>> {
        Ok(self.lock()?.base.clone())
    }

    fn reset(&self, store: &dyn ObjectStore, tree: &ObjectId) -> ExResult<()> {
        let mut datasets = BTreeMap::new();
        for (name, ds) in find_datasets(store, tree)? {
            datasets.insert(name, ds.state(store)?);
        }
        let mut inner = self.lock()?;
        inner.datasets = datasets;
        inner.base = Some(tree.clone());
        Ok(())
    }

    fn apply_changes(&self, diff: &RepoDiff) -> ExResult<()> {
        let mut inner = self.lock()?;
        for (name, ds_diff) in &diff.datasets {
            apply_to_state(inner.datasets.entry(name.clone()).or_default(), ds_diff);
        }
        Ok(())
    }

    fn sync_to(&self, tree: &ObjectId, diff: &RepoDiff) -> ExResult<()> {
        self.apply_changes(diff)?;
        self.lock()?.base = Some(tree.clone());
        Ok(())
    }

    fn dataset_names(&self) -> ExResult<Vec<String>> {
        Ok(self.lock()?.datasets.keys().cloned().collect())
    }

    fn read_state(&self, dataset: &str) -> ExResult<Option<DatasetState>> {
        Ok(self.lock()?.datasets.get(dataset).cloned())
    }
}
