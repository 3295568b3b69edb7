//! Show command
//!
//! Prints the commit header followed by either the diff against its first
//! parent or, with `--feature-counts`, one line per changed dataset.

use super::print_json;
use clap::Args;
use std::path::Path;
use tessera_core::diff::{encode_repo_diff, PatchType};
use tessera_engine::commands::diff::{feature_change_counts, show};
use tessera_engine::Repository;
use tessera_store::errors::Result;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Commit to show
    #[arg(value_name = "REF", default_value = "HEAD")]
    pub refish: String,

    /// Only count changed features per dataset
    #[arg(long)]
    pub feature_counts: bool,
}

pub fn execute(repo_path: &Path, args: ShowArgs) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let shown = show(&repo, &args.refish)?;
    let author = &shown.commit.author;

    println!("commit {}", shown.commit_id);
    println!("Author: {} <{}>", author.name, author.email);
    println!("Date:   {}", author.local_time());
    println!();
    for line in shown.commit.message.lines() {
        println!("    {}", line);
    }
    println!();

    if args.feature_counts {
        let counts = feature_change_counts(
            &repo,
            shown.commit.first_parent(),
            &shown.commit_id,
        )?;
        for (dataset, count) in counts {
            println!("{}: {} features changed", dataset, count);
        }
        return Ok(());
    }
    print_json(&encode_repo_diff(&shown.diff, PatchType::Full))
}
