//! # Backup Command Implementation

use anyhow::Result;
use clap::Args;

use metarepo::backup::BackupStore;
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::{flag_pair, Context};

/// Snapshot the manifests (and components) directory
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Snapshot name (defaults to backup_YYYYMMDD_HHMMSS)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Include the components directory (default)
    #[arg(long, overrides_with = "no_include_components")]
    pub include_components: bool,

    /// Only snapshot the manifests directory
    #[arg(long, overrides_with = "include_components")]
    pub no_include_components: bool,
}

/// Execute the `backup` command.
pub fn execute(args: BackupArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let include = flag_pair(args.include_components, args.no_include_components, true);

    let backup = BackupStore::new(&ctx.workspace)
        .create(args.name.as_deref(), include)
        .map_err(suggestions::with_hints)?;

    println!(
        "{} Created backup {}{}",
        emoji(out, "💾", "[BACKUP]"),
        backup.name(),
        if include { "" } else { " (manifests only)" }
    );
    println!("   {}", out.dim(&ctx.workspace.display_path(&backup.path).display().to_string()));
    Ok(())
}
