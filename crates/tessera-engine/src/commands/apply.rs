//! Applying a patch document to a branch or to the working copy.
//!
//! ## Pipeline (in order):
//! 1. Precondition: `no_commit` needs a working copy (hard stop, no reads)
//! 2. Resolve the target ref (default: the branch HEAD points at)
//! 3. Parse the document and decode it against the target's tree
//! 4. Evaluate every change, collecting every conflict
//! 5. Decide: any conflict rejects the whole patch, nothing left is `NoChanges`
//! 6. `no_commit` short-circuit: write the changes into the working copy only
//! 7. Write the new tree and the commit
//! 8. Move the ref (compare-and-set against the tip read in step 2)
//! 9. Bring the working copy along if it was checked out at the old tip

#![allow(clippy::result_large_err)]

use crate::repo::Repository;
use std::time::Instant;
use tessera_core::apply::{evaluate_patch, write_changes};
use tessera_core::diff::RepoDiff;
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::object::{ObjectId, ObjectStore};
use tessera_core::patch::parse_patch;
use tessera_core::{log_op_end, log_op_error, log_op_start};
use tessera_core_types::correlation::RequestContext;
use tessera_store::errors::Result;
use tessera_store::refs::branch_ref;

/// Options for [`apply_patch`]
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Branch or full ref to apply onto; `None` means the HEAD branch
    pub target_ref: Option<String>,
    /// Update the working copy only, leaving history untouched
    pub no_commit: bool,
}

/// Outcome of a successful apply
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// A commit was written and `ref_name` moved from `previous` onto it
    Committed {
        commit_id: ObjectId,
        ref_name: String,
        previous: ObjectId,
    },
    /// The changes were written into the working copy only
    WorkingCopyUpdated { changes: usize },
}

fn resolve_target(repo: &Repository, target_ref: Option<&str>) -> Result<(String, ObjectId)> {
    let ref_name = match target_ref {
        Some(name) if name.starts_with("refs/") => name.to_string(),
        Some(name) => branch_ref(name),
        None => repo.head_ref()?,
    };
    let tip = repo.refs().read_ref(&ref_name)?.ok_or_else(|| {
        ExError::new(ExErrorKind::UnknownRef)
            .with_op("apply_patch")
            .with_item(&ref_name)
            .with_message(format!("Unknown ref '{}'", ref_name))
    })?;
    Ok((ref_name, tip))
}

fn sync_working_copy(
    repo: &Repository,
    ref_name: &str,
    old_tree: &ObjectId,
    new_tree: &ObjectId,
    applied: &RepoDiff,
) -> Result<()> {
    let Some(wc) = repo.working_copy() else {
        return Ok(());
    };
    if repo.head_ref()? != ref_name {
        return Ok(());
    }
    match wc.base_tree()? {
        Some(base) if base == *old_tree => wc.sync_to(new_tree, applied),
        base => {
            tracing::info!(
                base = ?base.as_ref().map(ObjectId::short),
                "working copy is not at the previous tip; leaving it alone"
            );
            Ok(())
        }
    }
}

fn apply_patch_impl(
    repo: &mut Repository,
    source: &[u8],
    options: &ApplyOptions,
) -> Result<ApplyOutcome> {
    // Step 1
    if options.no_commit && repo.working_copy().is_none() {
        return Err(ExError::new(ExErrorKind::NoWorkingCopy)
            .with_op("apply_patch")
            .with_message("--no-commit requires a working copy"));
    }

    // Step 2
    let (ref_name, previous) = resolve_target(repo, options.target_ref.as_deref())?;
    let old_tree = repo.store().read_commit(&previous)?.tree;

    // Step 3
    let patch = parse_patch(source)?;
    let diff = patch.resolve(repo.store(), &old_tree)?;

    // Steps 4 and 5
    let evaluated = evaluate_patch(repo.store(), &old_tree, &diff)?;
    let noops = evaluated.noops;
    let applied = evaluated.decide()?;
    tracing::debug!(
        ref_name = %ref_name,
        changes = applied.change_count() as u64,
        noops = noops as u64,
        "patch applies"
    );

    // Step 6
    if options.no_commit {
        if let Some(wc) = repo.working_copy() {
            wc.apply_changes(&applied)?;
        }
        return Ok(ApplyOutcome::WorkingCopyUpdated {
            changes: applied.change_count(),
        });
    }

    // Step 7
    let committer = repo.config().committer()?;
    let author = patch.header.author(&committer)?;
    let new_tree = write_changes(repo.store(), &old_tree, &applied)?;

    // Step 8
    let commit_id = repo.write_commit(
        &ref_name,
        Some(&previous),
        new_tree.clone(),
        author,
        committer,
        &patch.header.message,
    )?;

    // Step 9
    sync_working_copy(repo, &ref_name, &old_tree, &new_tree, &applied)?;

    Ok(ApplyOutcome::Committed {
        commit_id,
        ref_name,
        previous,
    })
}

/// Apply the patch document in `source`
///
/// Nothing is written unless every change in the patch applies.
///
/// # Errors
///
/// - `NoWorkingCopy` for `no_commit` in a repository without a working copy
/// - `UnknownRef` if the target ref does not exist
/// - `InvalidPatch` for a malformed document
/// - `UnknownDataset` if the patch touches a dataset the target lacks
/// - `PatchDoesNotApply` carrying every conflict
/// - `NoChanges` if every change is already present
/// - `MissingIdentity` if committing without a configured user
/// - `Concurrency` if the ref moved while applying
pub fn apply_patch(
    repo: &mut Repository,
    source: &[u8],
    options: &ApplyOptions,
) -> Result<ApplyOutcome> {
    let ctx = RequestContext::new();
    log_op_start!(
        "apply_patch",
        request_id = ctx.request_id.as_str(),
        no_commit = options.no_commit
    );
    let start = Instant::now();

    let outcome = apply_patch_impl(repo, source, options).map_err(|e| {
        let e = e.with_request_id(ctx.request_id.clone());
        log_op_error!(
            "apply_patch",
            &e,
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = ctx.request_id.as_str(),
            conflicts = e.conflicts().len() as u64
        );
        e
    })?;

    match &outcome {
        ApplyOutcome::Committed { commit_id, .. } => {
            log_op_end!(
                "apply_patch",
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = ctx.request_id.as_str(),
                commit = commit_id.short()
            );
        }
        ApplyOutcome::WorkingCopyUpdated { changes } => {
            log_op_end!(
                "apply_patch",
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = ctx.request_id.as_str(),
                working_copy_changes = *changes as u64
            );
        }
    }
    Ok(outcome)
}
