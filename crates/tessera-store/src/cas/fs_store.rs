//! Filesystem-based Content-Addressable Storage
//!
//! Provides atomic writes, collision detection, and content-addressed reads

#![allow(clippy::result_large_err)]

use crate::cas::atomic::atomic_write;
use crate::cas::sharding::shard_path;
use crate::errors::{cas_collision, io_error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem-based CAS store
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a new CAS store at the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write content under a digest computed by the caller
    ///
    /// - Writes atomically using temp→rename
    /// - Idempotent: writing same content twice succeeds
    /// - Detects collisions: writing different content with same digest fails
    pub fn write(&self, digest: &str, content: &[u8]) -> Result<()> {
        let target_path = shard_path(&self.root, digest);

        match fs::read(&target_path) {
            Ok(existing) if existing == content => return Ok(()),
            Ok(_) => return Err(cas_collision(digest)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("read_cas", e)),
        }

        atomic_write(&target_path, content)
    }

    /// Read content by digest, `None` if absent
    pub fn read(&self, digest: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(shard_path(&self.root, digest)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read_cas", e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_cas() -> (FsStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cas = FsStore::new(temp_dir.path());
        (cas, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (cas, _dir) = setup_test_cas();
        cas.write("abcd", b"Hello, CAS!").unwrap();
        assert_eq!(cas.read("abcd").unwrap().unwrap(), b"Hello, CAS!");
    }

    #[test]
    fn test_idempotent_write() {
        let (cas, _dir) = setup_test_cas();
        cas.write("abcd", b"same").unwrap();
        cas.write("abcd", b"same").unwrap();
    }

    #[test]
    fn test_collision_detected() {
        let (cas, _dir) = setup_test_cas();
        cas.write("abcd", b"first").unwrap();
        let err = cas.write("abcd", b"second").unwrap_err();
        assert!(err.message().contains("collision"));
    }

    #[test]
    fn test_read_missing() {
        let (cas, _dir) = setup_test_cas();
        assert!(cas.read(&"0".repeat(64)).unwrap().is_none());
    }
}
