//! Diffs between snapshots, their JSON wire form, and the model both share.

pub mod compute;
pub mod model;
pub mod wire;

pub use compute::{diff_datasets, diff_states, diff_trees};
pub use model::{DatasetDiff, FeatureChange, FeatureDelta, RepoDiff, ValueChange};
pub use wire::{encode_repo_diff, PatchType, DIFF_KEY, HEADER_KEY};
