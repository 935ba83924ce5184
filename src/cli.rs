//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use metarepo::defaults;
use metarepo::output::OutputConfig;
use metarepo::workspace::Workspace;

use crate::commands;

/// metarepo - Convert a meta-repository between referenced and vendored components
#[derive(Parser, Debug)]
#[command(name = "metarepo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Meta-repository root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR", env = "METAREPO_ROOT")]
    root: Option<PathBuf>,

    /// Directory holding metarepo.yaml (defaults to <root>/manifests)
    #[arg(long, global = true, value_name = "DIR", env = "METAREPO_MANIFESTS")]
    manifests_dir: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert every component to the given mode
    Convert(commands::convert::ConvertArgs),

    /// Check that components on disk match the manifest's mode
    Verify(commands::verify::VerifyArgs),

    /// Run pre-flight validation without converting
    Validate(commands::validate::ValidateArgs),

    /// Snapshot the manifests (and components) directory
    Backup(commands::backup::BackupArgs),

    /// Restore a snapshot taken with `backup`
    Restore(commands::restore::RestoreArgs),

    /// Delete a snapshot
    DeleteBackup(commands::delete_backup::DeleteBackupArgs),

    /// Continue an interrupted or partially failed conversion
    Resume(commands::resume::ResumeArgs),

    /// List resumable conversions
    ListCheckpoints(commands::list_checkpoints::ListCheckpointsArgs),

    /// List backup snapshots, newest first
    ListBackups(commands::list_backups::ListBackupsArgs),
}

/// State shared by every command.
pub struct Context {
    pub workspace: Workspace,
    pub out: OutputConfig,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let root = self.root.unwrap_or_else(defaults::default_root);
        let mut workspace = Workspace::new(root);
        if let Some(dir) = self.manifests_dir {
            workspace = workspace.with_manifests_dir(dir);
        }
        let ctx = Context {
            workspace,
            out: OutputConfig::from_env_and_flag(&self.color),
        };

        match self.command {
            Commands::Convert(args) => commands::convert::execute(args, &ctx),
            Commands::Verify(args) => commands::verify::execute(args, &ctx),
            Commands::Validate(args) => commands::validate::execute(args, &ctx),
            Commands::Backup(args) => commands::backup::execute(args, &ctx),
            Commands::Restore(args) => commands::restore::execute(args, &ctx),
            Commands::DeleteBackup(args) => commands::delete_backup::execute(args, &ctx),
            Commands::Resume(args) => commands::resume::execute(args, &ctx),
            Commands::ListCheckpoints(args) => commands::list_checkpoints::execute(args, &ctx),
            Commands::ListBackups(args) => commands::list_backups::execute(args, &ctx),
        }
    }
}

#[cfg(test)]
impl Cli {
    pub fn into_convert(self) -> Option<commands::convert::ConvertArgs> {
        match self.command {
            Commands::Convert(args) => Some(args),
            _ => None,
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialization only happens in tests; ignore it
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

/// Resolve a `--flag` / `--no-flag` pair; clap's `overrides_with` guarantees
/// at most one of them is set.
pub fn flag_pair(yes: bool, no: bool, default: bool) -> bool {
    if no {
        false
    } else if yes {
        true
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_pair() {
        assert!(flag_pair(false, false, true));
        assert!(!flag_pair(false, false, false));
        assert!(flag_pair(true, false, false));
        assert!(!flag_pair(false, true, true));
    }

    #[test]
    fn test_global_root_flag() {
        let cli = Cli::try_parse_from(["metarepo", "--root", "/repo", "list-backups"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/repo")));
    }

    #[test]
    fn test_convert_requires_mode() {
        assert!(Cli::try_parse_from(["metarepo", "convert"]).is_err());
        assert!(Cli::try_parse_from(["metarepo", "convert", "hybrid"]).is_err());
        assert!(Cli::try_parse_from(["metarepo", "convert", "vendored"]).is_ok());
    }
}
