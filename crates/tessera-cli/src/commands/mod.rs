//! Subcommands; each exposes `execute`.

pub mod apply;
pub mod create_patch;
pub mod init;
pub mod show;
pub mod status;

use serde_json::Value;
use tessera_store::errors::Result;

/// Pretty-print a JSON document on stdout
pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
