//! # Resume Command Implementation
//!
//! Continues a conversion from its checkpoint. The target mode comes from
//! the checkpoint. No backup is taken and failures are not rolled back: the
//! checkpoint itself is the recovery state.

use anyhow::Result;
use clap::Args;

use metarepo::engine::orchestrator::FailurePolicy;
use metarepo::engine::{ConversionOptions, ResumeFrom};
use metarepo::error::Error;
use metarepo::output::emoji;
use metarepo::secrets::SecretPolicy;
use metarepo::suggestions;

use super::progress::ProgressObserver;
use crate::cli::{flag_pair, Context};

/// Continue an interrupted or partially failed conversion
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Checkpoint to continue (defaults to the most recent)
    #[arg(long, value_name = "ID")]
    pub checkpoint: Option<String>,

    /// Convert previously failed components again (default)
    #[arg(long, overrides_with = "no_retry_failed")]
    pub retry_failed: bool,

    /// Leave previously failed components failed
    #[arg(long, overrides_with = "retry_failed")]
    pub no_retry_failed: bool,

    /// Keep converting after a component fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Treat secret findings as component failures
    #[arg(long)]
    pub fail_on_secrets: bool,

    /// Drop files matched by each component's root .gitignore when vendoring
    #[arg(long)]
    pub respect_gitignore: bool,

    /// Skip verification
    #[arg(long)]
    pub no_verify: bool,
}

/// Execute the `resume` command.
pub fn execute(args: ResumeArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let engine = super::engine(ctx)?;

    let store = engine.checkpoints();
    let checkpoint = match &args.checkpoint {
        Some(id) => store.load(id),
        None => store.load_latest(),
    }
    .map_err(suggestions::with_hints)?;

    let Some(checkpoint) = checkpoint else {
        let error = Error::CheckpointNotFound {
            id: args.checkpoint.clone(),
        };
        if let Some(id) = &args.checkpoint {
            let known = store.list().map_err(suggestions::with_hints)?;
            let names: Vec<&str> = known.iter().map(|c| c.checkpoint_id.as_str()).collect();
            if !names.is_empty() {
                return Err(suggestions::unknown_name("checkpoint", id, &names));
            }
        }
        return Err(suggestions::with_hints(error));
    };

    println!(
        "{} Resuming {} ({} mode): {} pending, {} failed",
        emoji(out, "🔄", "[RUN]"),
        checkpoint.checkpoint_id,
        checkpoint.target_mode,
        checkpoint.pending_components.len(),
        checkpoint.failed_components.len()
    );

    let options = ConversionOptions {
        target: checkpoint.target_mode,
        force: false,
        failure_policy: FailurePolicy::from_continue_flag(args.continue_on_error),
        secrets: SecretPolicy::from_flags(true, args.fail_on_secrets),
        respect_ignore: args.respect_gitignore,
        atomic: false,
        create_backup: false,
        verify: !args.no_verify,
        resume: Some(ResumeFrom {
            checkpoint_id: Some(checkpoint.checkpoint_id.clone()),
        }),
        retry_failed: flag_pair(args.retry_failed, args.no_retry_failed, true),
    };

    let mut progress = ProgressObserver::new(out);
    let result = engine.convert(&options, &mut progress);
    progress.finish();

    let result = result.map_err(suggestions::with_hints)?;
    super::report_conversion(&result, out)
}
