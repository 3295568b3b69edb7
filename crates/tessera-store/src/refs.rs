//! Branch refs and the symbolic HEAD, stored in `repo.db`
//!
//! Ref updates are compare-and-set: the caller states which commit it
//! expects the ref to point at, and the update fails with `Concurrency` if
//! something else moved it in the meantime.

#![allow(clippy::result_large_err)]

use crate::db;
use crate::errors::{from_rusqlite, Result};
use crate::migrations::repo_migrations;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::object::{ObjectId, ObjectStore};

pub const HEAD: &str = "HEAD";
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Full ref name of a branch
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with(BRANCH_PREFIX) {
        branch.to_string()
    } else {
        format!("{}{}", BRANCH_PREFIX, branch)
    }
}

fn unknown_ref(refish: &str, message: String) -> ExError {
    ExError::new(ExErrorKind::UnknownRef)
        .with_item(refish)
        .with_message(message)
}

fn parse_stored_id(text: String) -> Result<ObjectId> {
    ObjectId::parse(&text).map_err(|e| {
        ExError::new(ExErrorKind::CorruptObject)
            .with_op("read_ref")
            .with_message(e.to_string())
    })
}

pub struct RefStore {
    conn: Connection,
}

impl RefStore {
    /// Open (creating and migrating if needed) the ref database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: db::open_migrated(path, repo_migrations())?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        db::configure(&conn)?;
        crate::migrations::apply_migrations(&mut conn, repo_migrations())?;
        Ok(Self { conn })
    }

    pub fn read_ref(&self, name: &str) -> Result<Option<ObjectId>> {
        let target: Option<String> = self
            .conn
            .query_row("SELECT target FROM refs WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(from_rusqlite)?;
        target.map(parse_stored_id).transpose()
    }

    /// Point `name` at `new` if it currently points at `expected_old`
    ///
    /// `expected_old = None` means the ref must not exist yet.
    pub fn update_ref(
        &mut self,
        name: &str,
        new: &ObjectId,
        expected_old: Option<&ObjectId>,
    ) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let current: Option<String> = tx
            .query_row("SELECT target FROM refs WHERE name = ?", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(from_rusqlite)?;
        if current.as_deref() != expected_old.map(ObjectId::as_str) {
            return Err(ExError::new(ExErrorKind::Concurrency)
                .with_op("update_ref")
                .with_item(name)
                .with_message(format!(
                    "Ref {} moved: expected {}, found {}",
                    name,
                    expected_old.map(ObjectId::as_str).unwrap_or("nothing"),
                    current.as_deref().unwrap_or("nothing")
                )));
        }

        tx.execute(
            "INSERT INTO refs (name, target, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET target = ?2, updated_at = ?3",
            rusqlite::params![name, new.as_str(), chrono::Utc::now().timestamp()],
        )
        .map_err(from_rusqlite)?;
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(ref_name = name, target = new.short(), "updated ref");
        Ok(())
    }

    /// Every ref, sorted by name
    pub fn list_refs(&self) -> Result<Vec<(String, ObjectId)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, target FROM refs ORDER BY name")
            .map_err(from_rusqlite)?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter()
            .map(|(name, target)| Ok((name, parse_stored_id(target)?)))
            .collect()
    }

    /// Full ref name HEAD points at, e.g. `refs/heads/main`
    pub fn head_branch(&self) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT branch FROM head WHERE id = 1", [], |row| row.get(0))
            .optional()
            .map_err(from_rusqlite)
    }

    pub fn set_head(&self, branch: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO head (id, branch) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET branch = ?1",
                [branch_ref(branch)],
            )
            .map_err(from_rusqlite)?;
        Ok(())
    }

    /// Commit HEAD points at, `None` on an unborn branch
    pub fn head_commit(&self) -> Result<Option<ObjectId>> {
        match self.head_branch()? {
            Some(branch) => self.read_ref(&branch),
            None => Ok(None),
        }
    }

    /// Resolve `HEAD`, a branch, `refs/heads/...` or a full commit id, with
    /// any number of trailing `^` for first parents
    pub fn resolve_refish(&self, store: &dyn ObjectStore, refish: &str) -> Result<ObjectId> {
        let base = refish.trim_end_matches('^');
        let parents = refish.len() - base.len();

        let mut id = if base == HEAD {
            self.head_commit()?
        } else if base.starts_with("refs/") {
            self.read_ref(base)?
        } else {
            match self.read_ref(&branch_ref(base))? {
                Some(id) => Some(id),
                None => match ObjectId::parse(base) {
                    Ok(id) if store.contains(&id)? => Some(id),
                    _ => None,
                },
            }
        }
        .ok_or_else(|| unknown_ref(refish, format!("Unknown ref '{}'", refish)))?;

        for _ in 0..parents {
            let commit = store.read_commit(&id)?;
            id = commit
                .first_parent()
                .cloned()
                .ok_or_else(|| unknown_ref(refish, format!("'{}' has no parent", refish)))?;
        }
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tessera_core::object::{Commit, MemoryObjectStore, Signature, Tree};

    fn commit(store: &MemoryObjectStore, parent: Option<&ObjectId>) -> ObjectId {
        let sig = Signature::now("T", "t@example.com");
        store
            .write_commit(&Commit {
                tree: store.write_tree(&Tree::default()).unwrap(),
                parents: parent.into_iter().cloned().collect(),
                author: sig.clone(),
                committer: sig,
                message: format!("after {:?}", parent.map(|p| p.short().to_string())),
            })
            .unwrap()
    }

    #[test]
    fn test_compare_and_set() {
        let store = MemoryObjectStore::new();
        let a = commit(&store, None);
        let b = commit(&store, Some(&a));
        let mut refs = RefStore::open_in_memory().unwrap();

        refs.update_ref("refs/heads/main", &a, None).unwrap();
        assert_eq!(refs.read_ref("refs/heads/main").unwrap(), Some(a.clone()));

        // Stale expectation
        let err = refs.update_ref("refs/heads/main", &b, None).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Concurrency);

        refs.update_ref("refs/heads/main", &b, Some(&a)).unwrap();
        assert_eq!(refs.read_ref("refs/heads/main").unwrap(), Some(b));
    }

    #[test]
    fn test_resolve_refish() {
        let store = MemoryObjectStore::new();
        let a = commit(&store, None);
        let b = commit(&store, Some(&a));
        let mut refs = RefStore::open_in_memory().unwrap();
        refs.set_head("main").unwrap();
        refs.update_ref("refs/heads/main", &b, None).unwrap();

        assert_eq!(refs.resolve_refish(&store, "HEAD").unwrap(), b);
        assert_eq!(refs.resolve_refish(&store, "main").unwrap(), b);
        assert_eq!(refs.resolve_refish(&store, "refs/heads/main").unwrap(), b);
        assert_eq!(refs.resolve_refish(&store, "HEAD^").unwrap(), a);
        assert_eq!(refs.resolve_refish(&store, a.as_str()).unwrap(), a);

        let err = refs.resolve_refish(&store, "HEAD^^").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::UnknownRef);
        let err = refs.resolve_refish(&store, "nope").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::UnknownRef);
    }

    #[test]
    fn test_unborn_head() {
        let refs = RefStore::open_in_memory().unwrap();
        refs.set_head("main").unwrap();
        assert_eq!(refs.head_branch().unwrap().as_deref(), Some("refs/heads/main"));
        assert_eq!(refs.head_commit().unwrap(), None);
        assert!(refs.list_refs().unwrap().is_empty());
    }
}
