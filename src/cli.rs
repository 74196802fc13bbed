//! The snapgate command-line interface.
//!
//! Reviews and promotes the not-approved artifacts that failing matches leave
//! behind. All operations are local file renames and reads.

use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::{
    config::Settings,
    diagnostics::print_error,
    store::{approved_counterpart, pending_artifacts, promote, strip_comment},
    ApprovalError,
};

pub mod output;

// ============================================================================
// CLI ARGUMENTS - Command-line argument definitions
// ============================================================================

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "snapgate",
    version,
    about = "Review and approve pending JSON snapshots."
)]
pub struct SnapgateArgs {
    /// YAML settings file; environment variables still take precedence.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ArgsCommand,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum ArgsCommand {
    /// List not-approved artifacts.
    Pending {
        /// Artifact root; defaults to the configured root.
        root: Option<PathBuf>,
    },
    /// Show how a not-approved artifact differs from its approved counterpart.
    Diff {
        /// The not-approved artifact.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Rename not-approved artifacts to their approved names.
    Approve {
        /// Artifacts to approve.
        files: Vec<PathBuf>,
        /// Approve every pending artifact under the root.
        #[arg(long, conflicts_with = "files")]
        all: bool,
        /// Artifact root used with --all.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Replace approved artifacts that already exist.
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// The main entry point for the CLI.
pub fn run() {
    let args = SnapgateArgs::parse();
    if let Err(e) = execute(args) {
        print_error(e);
        process::exit(1);
    }
}

/// Runs one parsed command.
pub fn execute(args: SnapgateArgs) -> Result<(), ApprovalError> {
    let settings = load_settings(args.config.as_deref())?;
    debug!(?settings, "settings resolved");

    match args.command {
        ArgsCommand::Pending { root } => {
            let root = root.unwrap_or(settings.root);
            let pending = pending_artifacts(&root)?;
            output::print_pending(&root, &pending);
            Ok(())
        }

        ArgsCommand::Diff { file } => handle_diff(&file),

        ArgsCommand::Approve {
            files,
            all,
            root,
            force,
        } => {
            let files = if all {
                let root = root.unwrap_or(settings.root);
                let pending = pending_artifacts(&root)?;
                if pending.is_empty() {
                    output::print_pending(&root, &pending);
                }
                pending
            } else if files.is_empty() {
                return Err(crate::err_msg!(Config, "no artifacts given")
                    .with_help("Name the not-approved files to approve, or pass --all."));
            } else {
                files
            };
            for file in &files {
                let approved = promote(file, force)?;
                output::print_approved(file, &approved);
            }
            Ok(())
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

fn handle_diff(file: &Path) -> Result<(), ApprovalError> {
    let pending = read_artifact(file)?;
    let approved_path = approved_counterpart(file).ok_or_else(|| {
        crate::err_msg!(Config, "{} is not a not-approved artifact", file.display())
    })?;
    let approved = if approved_path.is_file() {
        Some(read_artifact(&approved_path)?)
    } else {
        None
    };
    output::print_artifact_diff(&approved_path, approved.as_deref(), &pending);
    Ok(())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn load_settings(config: Option<&Path>) -> Result<Settings, ApprovalError> {
    match config {
        Some(path) => Ok(Settings::load(path)?.with_env_overrides()),
        None => Ok(Settings::from_env()),
    }
}

fn read_artifact(path: &Path) -> Result<String, ApprovalError> {
    let text =
        fs::read_to_string(path).map_err(|source| ApprovalError::io("read", path, source))?;
    Ok(strip_comment(&text).trim_end().to_string())
}
