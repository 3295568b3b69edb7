//! Apply command

use clap::Args;
use std::io::Read;
use std::path::{Path, PathBuf};
use tessera_engine::commands::apply::{apply_patch, ApplyOptions, ApplyOutcome};
use tessera_engine::Repository;
use tessera_store::errors::{io_error, Result};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Patch file to apply, or `-` to read standard input
    pub patch: PathBuf,

    /// Branch to apply onto instead of the current one
    #[arg(long = "ref", value_name = "BRANCH")]
    pub target_ref: Option<String>,

    /// Write the changes into the working copy without committing
    #[arg(long)]
    pub no_commit: bool,
}

fn read_patch(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| io_error("read_patch", e))?;
        return Ok(buf);
    }
    std::fs::read(path).map_err(|e| io_error("read_patch", e))
}

pub fn execute(repo_path: &Path, args: ApplyArgs) -> Result<()> {
    let mut repo = Repository::open(repo_path)?;
    let source = read_patch(&args.patch)?;
    let options = ApplyOptions {
        target_ref: args.target_ref,
        no_commit: args.no_commit,
    };

    match apply_patch(&mut repo, &source, &options)? {
        ApplyOutcome::Committed { commit_id, .. } => println!("Commit {}", commit_id),
        ApplyOutcome::WorkingCopyUpdated { changes } => {
            println!("Updated working copy ({} changes)", changes)
        }
    }
    Ok(())
}
