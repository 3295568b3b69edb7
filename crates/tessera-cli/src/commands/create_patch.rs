//! Create-patch command

use super::print_json;
use clap::{Args, ValueEnum};
use std::path::Path;
use tessera_core::diff::PatchType;
use tessera_engine::commands::diff::create_patch;
use tessera_engine::Repository;
use tessera_store::errors::Result;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PatchTypeArg {
    /// Old and new values for every change
    Full,
    /// New values only; updates become unconditional
    Minimal,
}

impl From<PatchTypeArg> for PatchType {
    fn from(arg: PatchTypeArg) -> Self {
        match arg {
            PatchTypeArg::Full => PatchType::Full,
            PatchTypeArg::Minimal => PatchType::Minimal,
        }
    }
}

#[derive(Debug, Args)]
pub struct CreatePatchArgs {
    /// Commit to describe
    #[arg(value_name = "REF", default_value = "HEAD")]
    pub refish: String,

    #[arg(long, value_enum, default_value = "full")]
    pub patch_type: PatchTypeArg,
}

pub fn execute(repo_path: &Path, args: CreatePatchArgs) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let document = create_patch(&repo, &args.refish, args.patch_type.into())?;
    print_json(&document)
}
