//! Status command

use super::print_json;
use std::path::Path;
use tessera_core::diff::{encode_repo_diff, PatchType};
use tessera_engine::commands::status::status;
use tessera_engine::Repository;
use tessera_store::errors::Result;

pub fn execute(repo_path: &Path) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let pending = status(&repo)?;
    if pending.is_empty() {
        println!("Nothing to commit, working copy clean");
        return Ok(());
    }
    print_json(&encode_repo_diff(&pending, PatchType::Full))
}
