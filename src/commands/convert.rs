//! # Convert Command Implementation
//!
//! Implements `metarepo convert <vendored|reference>`: pre-flight
//! validation, an optional backup, ordered per-component conversion with a
//! checkpoint, rollback on failure in atomic mode, and verification.
//!
//! `--dry-run` prints the plan and the validation report and touches
//! nothing. It always exits 0.

use anyhow::Result;
use clap::Args;

use metarepo::config::Mode;
use metarepo::engine::orchestrator::FailurePolicy;
use metarepo::engine::{ConversionOptions, ConversionPlan, PlannedAction, ResumeFrom};
use metarepo::output::{emoji, OutputConfig};
use metarepo::secrets::SecretPolicy;
use metarepo::suggestions;

use super::progress::ProgressObserver;
use crate::cli::{flag_pair, Context};

/// Convert every component to the given mode
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Target mode
    #[arg(value_enum, value_name = "MODE")]
    pub mode: Mode,

    /// Show what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Re-vendor components whose provenance already matches
    #[arg(long)]
    pub force: bool,

    /// Keep converting after a component fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Scan fetched trees for credentials (default)
    #[arg(long, overrides_with = "no_check_secrets")]
    pub check_secrets: bool,

    /// Skip the secret scan
    #[arg(long, overrides_with = "check_secrets")]
    pub no_check_secrets: bool,

    /// Treat secret findings as component failures
    #[arg(long)]
    pub fail_on_secrets: bool,

    /// Snapshot the workspace before converting (default)
    #[arg(long, overrides_with = "no_backup")]
    pub backup: bool,

    /// Do not snapshot the workspace
    #[arg(long, overrides_with = "backup")]
    pub no_backup: bool,

    /// Restore the snapshot if the conversion fails (default)
    #[arg(long, overrides_with = "no_atomic")]
    pub atomic: bool,

    /// Keep partial progress on failure
    #[arg(long, overrides_with = "atomic")]
    pub no_atomic: bool,

    /// Drop files matched by each component's root .gitignore when vendoring
    #[arg(long)]
    pub respect_gitignore: bool,

    /// Verify provenance after a successful conversion (default)
    #[arg(long, overrides_with = "no_verify")]
    pub verify: bool,

    /// Skip verification
    #[arg(long, overrides_with = "verify")]
    pub no_verify: bool,

    /// Continue from the most recent checkpoint
    #[arg(long)]
    pub resume: bool,

    /// Continue from a specific checkpoint (implies --resume)
    #[arg(long, value_name = "ID")]
    pub checkpoint: Option<String>,

    /// Convert components that failed in the resumed checkpoint again
    #[arg(long)]
    pub retry_failed: bool,
}

impl ConvertArgs {
    pub fn options(&self) -> ConversionOptions {
        let resume = (self.resume || self.checkpoint.is_some()).then(|| ResumeFrom {
            checkpoint_id: self.checkpoint.clone(),
        });
        ConversionOptions {
            target: self.mode,
            force: self.force,
            failure_policy: FailurePolicy::from_continue_flag(self.continue_on_error),
            secrets: SecretPolicy::from_flags(
                flag_pair(self.check_secrets, self.no_check_secrets, true),
                self.fail_on_secrets,
            ),
            respect_ignore: self.respect_gitignore,
            atomic: flag_pair(self.atomic, self.no_atomic, true),
            create_backup: flag_pair(self.backup, self.no_backup, true),
            verify: flag_pair(self.verify, self.no_verify, true),
            resume,
            retry_failed: self.retry_failed,
        }
    }
}

/// Execute the `convert` command.
pub fn execute(args: ConvertArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let options = args.options();
    let engine = super::engine(ctx)?;

    if args.dry_run {
        match engine.plan(&options) {
            Ok(plan) => print_plan(&plan, out),
            Err(e) => println!(
                "{} Cannot plan conversion: {}",
                emoji(out, "❌", "[ERR]"),
                out.failure(&e.to_string())
            ),
        }
        return Ok(());
    }

    println!(
        "{} Converting {} to {} mode",
        emoji(out, "🔄", "[RUN]"),
        ctx.workspace.root.display(),
        options.target
    );

    let mut progress = ProgressObserver::new(out);
    let result = engine.convert(&options, &mut progress);
    progress.finish();

    let result = result.map_err(suggestions::with_hints)?;
    super::report_conversion(&result, out)
}

fn print_plan(plan: &ConversionPlan, out: &OutputConfig) {
    println!(
        "{} Dry run: {} -> {} ({} component(s))",
        emoji(out, "🔍", "[PLAN]"),
        plan.current,
        plan.target,
        plan.steps.len()
    );
    for (index, step) in plan.steps.iter().enumerate() {
        let action = match &step.action {
            PlannedAction::Blocked(_) => out.failure(&step.action.to_string()),
            PlannedAction::Skip(_) => out.dim(&step.action.to_string()),
            _ => step.action.to_string(),
        };
        println!("   {:>3}. {} - {}", index + 1, step.name, action);
    }

    let report = &plan.validation;
    if report.valid {
        println!("\n{} Pre-flight validation passed", emoji(out, "✅", "[OK]"));
    } else {
        println!(
            "\n{} Pre-flight validation failed; convert would not start",
            emoji(out, "❌", "[ERR]")
        );
    }
    for error in &report.errors {
        println!("   {} {}", emoji(out, "❌", "[ERR]"), error);
    }
    for warning in &report.warnings {
        println!("   {} {}", emoji(out, "⚠️", "[WARN]"), out.warning(warning));
    }
}
