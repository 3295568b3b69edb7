//! Tessera Core - versioned tabular datasets as content-addressed snapshots
//!
//! This crate provides the storage-independent kernel of tessera, including:
//! - Content-addressed objects (blobs, trees, commits) behind an `ObjectStore` port
//! - Tree traversal with caller-controlled pruning, and path-based tree editing
//! - The dataset model: meta items and primary-keyed features inside a snapshot
//! - Diffs between snapshots and their JSON wire form
//! - Patch parsing, validation and conflict-aggregating application
//! - Ports for the diff annotation cache and the working copy

pub mod annotations;
pub mod apply;
pub mod dataset;
pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod object;
pub mod patch;
pub mod tree;
pub mod working_copy;

pub use tessera_core_types::schema;

// Re-export commonly used types
pub use annotations::{AnnotationStore, NullAnnotations};
pub use apply::{evaluate_patch, write_changes, Conflict, EvaluatedPatch};
pub use dataset::{Dataset, DatasetState, Feature, MetaItemName, PrimaryKey};
pub use diff::{DatasetDiff, FeatureChange, PatchType, RepoDiff, ValueChange};
pub use errors::{ExError, ExErrorKind, ExResult, Result, TesseraError};
pub use object::{Commit, MemoryObjectStore, ObjectId, ObjectStore, Signature};
pub use patch::{parse_patch, Patch, PatchHeader};
pub use working_copy::WorkingCopy;
