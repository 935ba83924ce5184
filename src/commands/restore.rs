//! # Restore Command Implementation
//!
//! Replaces the live manifests directory (and, when the snapshot holds one,
//! the components directory) with a backup. Asks for confirmation on a
//! terminal; non-interactive runs need `--yes`.

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use metarepo::backup::{BackupHandle, BackupStore};
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::{flag_pair, Context};

/// Restore a snapshot taken with `backup`
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Name of the backup to restore
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Restore the components directory too (default when the snapshot has it)
    #[arg(long, overrides_with = "no_restore_components")]
    pub restore_components: bool,

    /// Only restore the manifests directory
    #[arg(long, overrides_with = "restore_components")]
    pub no_restore_components: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `restore` command.
pub fn execute(args: RestoreArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let store = BackupStore::new(&ctx.workspace);
    let backup = lookup(&store, &args.name)?;

    let with_components = flag_pair(
        args.restore_components,
        args.no_restore_components,
        backup.metadata.includes_components,
    );

    if !args.yes && !confirm(&backup, with_components, out.interactive)? {
        println!("Restore cancelled");
        return Ok(());
    }

    store
        .restore_handle(&backup, with_components)
        .map_err(suggestions::with_hints)?;

    println!(
        "{} Restored backup {}{}",
        emoji(out, "✅", "[OK]"),
        backup.name(),
        if with_components { " (manifests and components)" } else { " (manifests)" }
    );
    Ok(())
}

/// Find a backup by name, suggesting a close match when it does not exist.
pub(crate) fn lookup(store: &BackupStore, name: &str) -> Result<BackupHandle> {
    if let Some(backup) = store.get(name).map_err(suggestions::with_hints)? {
        return Ok(backup);
    }
    let known = store.list().map_err(suggestions::with_hints)?;
    let names: Vec<&str> = known.iter().map(|b| b.name()).collect();
    Err(suggestions::unknown_name("backup", name, &names))
}

fn confirm(backup: &BackupHandle, with_components: bool, interactive: bool) -> Result<bool> {
    if !interactive {
        return Err(suggestions::restore_needs_confirmation(backup.name()));
    }
    let what = if with_components {
        "manifests and components"
    } else {
        "manifests"
    };
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Replace the current {} with backup '{}' ({})?",
            what,
            backup.name(),
            backup.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ))
        .default(false)
        .interact()?;
    Ok(answer)
}
