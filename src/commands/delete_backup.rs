//! # Delete Backup Command Implementation

use anyhow::Result;
use clap::Args;

use metarepo::backup::BackupStore;
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::Context;

/// Delete a snapshot
#[derive(Args, Debug)]
pub struct DeleteBackupArgs {
    /// Name of the backup to delete
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Execute the `delete-backup` command.
pub fn execute(args: DeleteBackupArgs, ctx: &Context) -> Result<()> {
    let store = BackupStore::new(&ctx.workspace);
    let backup = super::restore::lookup(&store, &args.name)?;
    store.delete(backup.name()).map_err(suggestions::with_hints)?;
    println!("{} Deleted backup {}", emoji(&ctx.out, "🗑️", "[DEL]"), backup.name());
    Ok(())
}
