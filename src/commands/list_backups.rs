//! # List Backups Command Implementation

use anyhow::Result;
use clap::Args;

use metarepo::backup::{BackupMetadata, BackupStore};
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::Context;

/// List backup snapshots, newest first
#[derive(Args, Debug)]
pub struct ListBackupsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Execute the `list-backups` command.
pub fn execute(args: ListBackupsArgs, ctx: &Context) -> Result<()> {
    let backups = BackupStore::new(&ctx.workspace)
        .list()
        .map_err(suggestions::with_hints)?;

    if args.json {
        let metadata: Vec<&BackupMetadata> = backups.iter().map(|b| &b.metadata).collect();
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    if backups.is_empty() {
        println!("No backups");
        return Ok(());
    }

    for backup in &backups {
        println!(
            "{} {}  {}{}",
            emoji(&ctx.out, "💾", "-"),
            backup.name(),
            ctx.out
                .dim(&backup.metadata.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            if backup.metadata.includes_components {
                ""
            } else {
                "  (manifests only)"
            }
        );
    }
    Ok(())
}
