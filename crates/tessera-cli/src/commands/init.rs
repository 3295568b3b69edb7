//! Init command
//!
//! Creates `.tessera/` with an empty root commit on the initial branch.

use clap::Args;
use std::path::Path;
use tessera_engine::{InitOptions, Repository};
use tessera_store::errors::{io_error, Result};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Name of the initial branch
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Committer name written to the repository config
    #[arg(long)]
    pub name: Option<String>,

    /// Committer email written to the repository config
    #[arg(long)]
    pub email: Option<String>,

    /// Also create a working copy
    #[arg(long)]
    pub working_copy: bool,
}

pub fn execute(repo_path: &Path, args: InitArgs) -> Result<()> {
    std::fs::create_dir_all(repo_path).map_err(|e| io_error("init", e))?;
    let options = InitOptions {
        branch: args.branch,
        user_name: args.name,
        user_email: args.email,
        working_copy: args.working_copy,
    };
    let repo = Repository::init(repo_path, &options)?;
    println!(
        "Initialized empty tessera repository in {}",
        repo.dot_dir().display()
    );
    Ok(())
}
