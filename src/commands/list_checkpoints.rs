//! # List Checkpoints Command Implementation

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use metarepo::checkpoint::{Checkpoint, CheckpointStore};
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::Context;

/// List resumable conversions
#[derive(Args, Debug)]
pub struct ListCheckpointsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckpointSummary<'a> {
    checkpoint_id: &'a str,
    target_mode: &'a str,
    created_at: String,
    completed: usize,
    failed: usize,
    pending: usize,
}

impl<'a> From<&'a Checkpoint> for CheckpointSummary<'a> {
    fn from(c: &'a Checkpoint) -> Self {
        Self {
            checkpoint_id: &c.checkpoint_id,
            target_mode: c.target_mode.as_str(),
            created_at: c.created_at.to_rfc3339(),
            completed: c.completed_components.len(),
            failed: c.failed_components.len(),
            pending: c.pending_components.len(),
        }
    }
}

/// Execute the `list-checkpoints` command.
pub fn execute(args: ListCheckpointsArgs, ctx: &Context) -> Result<()> {
    let store = CheckpointStore::new(&ctx.workspace.checkpoints_dir);
    let checkpoints = store.list().map_err(suggestions::with_hints)?;

    if args.json {
        let summaries: Vec<CheckpointSummary> = checkpoints.iter().map(CheckpointSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if checkpoints.is_empty() {
        println!("No checkpoints");
        return Ok(());
    }

    for checkpoint in &checkpoints {
        println!(
            "{} {}  {}  {}",
            emoji(&ctx.out, "📍", "-"),
            checkpoint.checkpoint_id,
            checkpoint.target_mode,
            ctx.out.dim(&checkpoint.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
        );
        println!(
            "   {} completed, {} failed, {} pending",
            checkpoint.completed_components.len(),
            checkpoint.failed_components.len(),
            checkpoint.pending_components.len()
        );
    }
    Ok(())
}
