//! Content-Addressable Storage (CAS)
//!
//! Provides:
//! - Filesystem-based CAS with atomic writes
//! - Collision detection
//! - Sharding by first 2 hex chars of digest
//! - `CasObjectStore`, the on-disk `ObjectStore`

mod atomic;
mod fs_store;
mod object_store;
mod sharding;

pub use fs_store::FsStore;
pub use object_store::CasObjectStore;
