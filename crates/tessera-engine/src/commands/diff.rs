//! Diffs between commits, plus the `show` and `create-patch` commands.
//!
//! Tree diffs are memoized in the annotation cache under the pair of tree
//! ids. The cache key does not record direction, so a stored diff carries
//! the tree it was computed from and is reversed when read the other way.

#![allow(clippy::result_large_err)]

use crate::repo::{empty_tree_id, Repository};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tessera_core::annotations::{DIFF_ANNOTATION, FEATURE_COUNTS_ANNOTATION};
use tessera_core::diff::{diff_trees, PatchType, RepoDiff};
use tessera_core::object::{Commit, ObjectId};
use tessera_core::patch::{patch_document, PatchHeader};
use tessera_core::{log_op_end, log_op_error, log_op_start};
use tessera_store::errors::Result;

const BASE_FIELD: &str = "base";
const DIFF_FIELD: &str = "diff";

/// A commit together with the diff it introduced
#[derive(Debug, Clone, PartialEq)]
pub struct ShowResult {
    pub commit_id: ObjectId,
    pub commit: Commit,
    pub diff: RepoDiff,
}

fn tree_of(repo: &Repository, commit: Option<&ObjectId>) -> Result<ObjectId> {
    match commit {
        Some(id) => Ok(repo.read_commit(id)?.tree),
        None => empty_tree_id(),
    }
}

fn cached_diff(repo: &Repository, old: &ObjectId, new: &ObjectId) -> Result<Option<RepoDiff>> {
    let Some(mut data) = repo
        .annotations()
        .get(old.as_str(), new.as_str(), DIFF_ANNOTATION)?
    else {
        return Ok(None);
    };

    let base = data.remove(BASE_FIELD);
    let diff = data
        .remove(DIFF_FIELD)
        .map(serde_json::from_value::<RepoDiff>);
    match (base, diff) {
        (Some(Value::String(base)), Some(Ok(diff))) => {
            if base == old.as_str() {
                Ok(Some(diff))
            } else {
                Ok(Some(diff.reversed()))
            }
        }
        _ => {
            tracing::debug!(
                old = old.short(),
                new = new.short(),
                "ignoring undecodable diff annotation"
            );
            Ok(None)
        }
    }
}

fn tree_diff(repo: &Repository, old: &ObjectId, new: &ObjectId) -> Result<RepoDiff> {
    if let Some(diff) = cached_diff(repo, old, new)? {
        return Ok(diff);
    }

    let diff = diff_trees(repo.store(), Some(old), new)?;
    let mut data = Map::new();
    data.insert(BASE_FIELD.to_string(), Value::String(old.to_string()));
    data.insert(DIFF_FIELD.to_string(), serde_json::to_value(&diff)?);
    repo.annotations()
        .store(old.as_str(), new.as_str(), DIFF_ANNOTATION, &data)?;
    Ok(diff)
}

fn diff_commits_impl(
    repo: &Repository,
    base: Option<&ObjectId>,
    target: &ObjectId,
) -> Result<RepoDiff> {
    let old = tree_of(repo, base)?;
    let new = tree_of(repo, Some(target))?;
    tree_diff(repo, &old, &new)
}

/// Diff two commits; `base = None` diffs against an empty snapshot
///
/// # Errors
///
/// Returns `NotFound` for unknown commits, or a store failure.
pub fn diff_commits(
    repo: &Repository,
    base: Option<&ObjectId>,
    target: &ObjectId,
) -> Result<RepoDiff> {
    log_op_start!("diff_commits", commit = target.short());
    let start = Instant::now();

    let diff = diff_commits_impl(repo, base, target).map_err(|e| {
        log_op_error!(
            "diff_commits",
            &e,
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "diff_commits",
        duration_ms = start.elapsed().as_millis() as u64,
        changes = diff.change_count() as u64
    );
    Ok(diff)
}

fn feature_change_counts_impl(
    repo: &Repository,
    base: Option<&ObjectId>,
    target: &ObjectId,
) -> Result<BTreeMap<String, usize>> {
    let old = tree_of(repo, base)?;
    let new = tree_of(repo, Some(target))?;

    if let Some(data) = repo
        .annotations()
        .get(old.as_str(), new.as_str(), FEATURE_COUNTS_ANNOTATION)?
    {
        let counts: Option<BTreeMap<String, usize>> = data
            .into_iter()
            .map(|(name, count)| count.as_u64().map(|n| (name, n as usize)))
            .collect();
        if let Some(counts) = counts {
            return Ok(counts);
        }
        tracing::debug!("ignoring undecodable feature count annotation");
    }

    let counts = tree_diff(repo, &old, &new)?.feature_counts();
    let data: Map<String, Value> = counts
        .iter()
        .map(|(name, count)| (name.clone(), Value::from(*count)))
        .collect();
    repo.annotations()
        .store(old.as_str(), new.as_str(), FEATURE_COUNTS_ANNOTATION, &data)?;
    Ok(counts)
}

/// Number of changed features per dataset between two commits
///
/// # Errors
///
/// As [`diff_commits`].
pub fn feature_change_counts(
    repo: &Repository,
    base: Option<&ObjectId>,
    target: &ObjectId,
) -> Result<BTreeMap<String, usize>> {
    log_op_start!("feature_change_counts", commit = target.short());
    let start = Instant::now();

    let counts = feature_change_counts_impl(repo, base, target).map_err(|e| {
        log_op_error!(
            "feature_change_counts",
            &e,
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "feature_change_counts",
        duration_ms = start.elapsed().as_millis() as u64,
        datasets = counts.len() as u64
    );
    Ok(counts)
}

fn show_impl(repo: &Repository, refish: &str) -> Result<ShowResult> {
    let commit_id = repo.resolve(refish)?;
    let commit = repo.read_commit(&commit_id)?;
    let diff = diff_commits_impl(repo, commit.first_parent(), &commit_id)?;
    Ok(ShowResult {
        commit_id,
        commit,
        diff,
    })
}

/// The commit `refish` names and the diff against its first parent
///
/// # Errors
///
/// Returns `UnknownRef` if `refish` does not resolve.
pub fn show(repo: &Repository, refish: &str) -> Result<ShowResult> {
    log_op_start!("show", refish = refish);
    let start = Instant::now();

    let result = show_impl(repo, refish).map_err(|e| {
        log_op_error!(
            "show",
            &e,
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "show",
        duration_ms = start.elapsed().as_millis() as u64,
        commit = result.commit_id.short()
    );
    Ok(result)
}

/// Patch document reproducing the commit `refish` on top of its parent
///
/// # Errors
///
/// Returns `UnknownRef` if `refish` does not resolve.
pub fn create_patch(repo: &Repository, refish: &str, patch_type: PatchType) -> Result<Value> {
    log_op_start!("create_patch", refish = refish);
    let start = Instant::now();

    let document = show_impl(repo, refish)
        .and_then(|shown| {
            let header = PatchHeader::from_commit(&shown.commit, shown.commit.first_parent());
            patch_document(&header, &shown.diff, patch_type)
        })
        .map_err(|e| {
            log_op_error!(
                "create_patch",
                &e,
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

    log_op_end!(
        "create_patch",
        duration_ms = start.elapsed().as_millis() as u64
    );
    Ok(document)
}
