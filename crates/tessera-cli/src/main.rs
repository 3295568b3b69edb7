//! Tessera CLI
//!
//! Command-line interface for tessera repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::errors::{ExError, ExErrorKind};
use tessera_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - version control for tabular and geospatial datasets", long_about = None)]
struct Cli {
    /// Repository directory
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Emit JSON log lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a repository with an empty root commit
    Init(commands::init::InitArgs),
    /// Apply a patch file to a branch or the working copy
    Apply(commands::apply::ApplyArgs),
    /// Print a patch reproducing a commit
    CreatePatch(commands::create_patch::CreatePatchArgs),
    /// Show a commit and the changes it introduced
    Show(commands::show::ShowArgs),
    /// Show uncommitted working copy changes
    Status,
}

fn report(err: &ExError) {
    if err.kind() == ExErrorKind::PatchDoesNotApply {
        for conflict in err.conflicts() {
            eprintln!("{}", conflict);
        }
    }
    if err.message().is_empty() {
        eprintln!("Error: {}", err);
    } else {
        eprintln!("Error: {}", err.message());
    }
}

fn main() {
    let cli = Cli::parse();
    init(if cli.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(&cli.repo, args),
        Commands::Apply(args) => commands::apply::execute(&cli.repo, args),
        Commands::CreatePatch(args) => commands::create_patch::execute(&cli.repo, args),
        Commands::Show(args) => commands::show::execute(&cli.repo, args),
        Commands::Status => commands::status::execute(&cli.repo),
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(e.exit_code());
    }
}
