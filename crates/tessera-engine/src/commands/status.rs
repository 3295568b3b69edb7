//! Uncommitted working copy changes.

#![allow(clippy::result_large_err)]

use crate::repo::Repository;
use std::time::Instant;
use tessera_core::diff::RepoDiff;
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::working_copy::working_copy_status;
use tessera_core::{log_op_end, log_op_error, log_op_start};
use tessera_store::errors::Result;

fn status_impl(repo: &Repository) -> Result<RepoDiff> {
    let wc = repo.working_copy().ok_or_else(|| {
        ExError::new(ExErrorKind::NoWorkingCopy)
            .with_op("status")
            .with_message("This repository has no working copy")
    })?;
    working_copy_status(repo.store(), wc)
}

/// Diff from the working copy's base to its materialised state
///
/// # Errors
///
/// Returns `NoWorkingCopy` if the repository has none.
pub fn status(repo: &Repository) -> Result<RepoDiff> {
    log_op_start!("status");
    let start = Instant::now();

    let diff = status_impl(repo).map_err(|e| {
        log_op_error!(
            "status",
            &e,
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "status",
        duration_ms = start.elapsed().as_millis() as u64,
        changes = diff.change_count() as u64
    );
    Ok(diff)
}
