//! Diff data model.
//!
//! A [`RepoDiff`] maps dataset names to [`DatasetDiff`]s. Meta changes are
//! keyed by item, feature changes form a sequence with at most one change
//! per primary key. All types serialize deterministically so a computed diff
//! can be cached as-is.

use crate::dataset::{Feature, MetaItemName, PrimaryKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Change to a single meta item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValueChange {
    Updated { old: Value, new: Value },
    Added { new: Value },
    Removed { old: Value },
    /// New value with no assertion about the prior value
    SetUnconditional { new: Value },
}

impl ValueChange {
    /// Asserted prior value, if the change carries one
    pub fn old(&self) -> Option<&Value> {
        match self {
            ValueChange::Updated { old, .. } | ValueChange::Removed { old } => Some(old),
            _ => None,
        }
    }

    /// Value after the change, `None` for a removal
    pub fn new_value(&self) -> Option<&Value> {
        match self {
            ValueChange::Updated { new, .. }
            | ValueChange::Added { new }
            | ValueChange::SetUnconditional { new } => Some(new),
            ValueChange::Removed { .. } => None,
        }
    }

    /// The change that undoes this one
    ///
    /// An unconditional change asserts nothing to restore and is returned
    /// unchanged.
    pub fn reversed(&self) -> Self {
        match self {
            ValueChange::Updated { old, new } => ValueChange::Updated {
                old: new.clone(),
                new: old.clone(),
            },
            ValueChange::Added { new } => ValueChange::Removed { old: new.clone() },
            ValueChange::Removed { old } => ValueChange::Added { new: old.clone() },
            ValueChange::SetUnconditional { .. } => self.clone(),
        }
    }
}

/// Change to a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeatureChange {
    Updated { old: Feature, new: Feature },
    Inserted { new: Feature },
    Deleted { old: Feature },
    /// New value with no assertion about the prior value
    SetUnconditional { new: Feature },
}

impl FeatureChange {
    pub fn old(&self) -> Option<&Feature> {
        match self {
            FeatureChange::Updated { old, .. } | FeatureChange::Deleted { old } => Some(old),
            _ => None,
        }
    }

    pub fn new_value(&self) -> Option<&Feature> {
        match self {
            FeatureChange::Updated { new, .. }
            | FeatureChange::Inserted { new }
            | FeatureChange::SetUnconditional { new } => Some(new),
            FeatureChange::Deleted { .. } => None,
        }
    }

    /// See [`ValueChange::reversed`]
    pub fn reversed(&self) -> Self {
        match self {
            FeatureChange::Updated { old, new } => FeatureChange::Updated {
                old: new.clone(),
                new: old.clone(),
            },
            FeatureChange::Inserted { new } => FeatureChange::Deleted { old: new.clone() },
            FeatureChange::Deleted { old } => FeatureChange::Inserted { new: old.clone() },
            FeatureChange::SetUnconditional { .. } => self.clone(),
        }
    }
}

/// A feature change together with the key it applies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDelta {
    pub pk: PrimaryKey,
    pub change: FeatureChange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDiff {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<MetaItemName, ValueChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature: Vec<FeatureDelta>,
}

impl DatasetDiff {
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.feature.is_empty()
    }

    /// Order feature changes by primary key
    pub fn sort_features(&mut self) {
        self.feature.sort_by(|a, b| a.pk.cmp(&b.pk));
    }
}

/// Per-dataset diffs for a whole snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoDiff {
    pub datasets: BTreeMap<String, DatasetDiff>,
}

impl RepoDiff {
    pub fn is_empty(&self) -> bool {
        self.datasets.values().all(DatasetDiff::is_empty)
    }

    /// Add a dataset diff, dropping it if empty
    pub fn insert(&mut self, name: impl Into<String>, diff: DatasetDiff) {
        if !diff.is_empty() {
            self.datasets.insert(name.into(), diff);
        }
    }

    /// Number of feature changes per dataset
    pub fn feature_counts(&self) -> BTreeMap<String, usize> {
        self.datasets
            .iter()
            .map(|(name, diff)| (name.clone(), diff.feature.len()))
            .collect()
    }

    /// The diff from this diff's new side back to its old side
    pub fn reversed(&self) -> Self {
        let datasets = self
            .datasets
            .iter()
            .map(|(name, diff)| {
                let reversed = DatasetDiff {
                    meta: diff
                        .meta
                        .iter()
                        .map(|(item, change)| (item.clone(), change.reversed()))
                        .collect(),
                    feature: diff
                        .feature
                        .iter()
                        .map(|delta| FeatureDelta {
                            pk: delta.pk.clone(),
                            change: delta.change.reversed(),
                        })
                        .collect(),
                };
                (name.clone(), reversed)
            })
            .collect();
        Self { datasets }
    }

    /// Total number of meta and feature changes
    pub fn change_count(&self) -> usize {
        self.datasets
            .values()
            .map(|d| d.meta.len() + d.feature.len())
            .sum()
    }
}
