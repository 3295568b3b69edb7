//! Sharding logic for CAS
//!
//! Objects are spread over subdirectories named by the first 2 hex
//! characters of their digest.

use std::path::{Path, PathBuf};

/// For digest "abc123...", returns "<root>/ab/abc123..."
pub fn shard_path(root: &Path, digest: &str) -> PathBuf {
    let shard = &digest[..2.min(digest.len())];
    root.join(shard).join(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_path() {
        let path = shard_path(Path::new("/objects"), "abc123def456");
        assert_eq!(path, PathBuf::from("/objects/ab/abc123def456"));
    }

    #[test]
    fn test_short_digest_does_not_panic() {
        let path = shard_path(Path::new("/objects"), "a");
        assert_eq!(path, PathBuf::from("/objects/a/a"));
    }
}
