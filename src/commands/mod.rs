//! # CLI Command Implementations
//!
//! One module per `metarepo` subcommand. Each module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] and calls into the `metarepo` library.

pub mod backup;
pub mod convert;
pub mod delete_backup;
pub mod list_backups;
pub mod list_checkpoints;
pub mod progress;
pub mod restore;
pub mod resume;
pub mod validate;
pub mod verify;

use anyhow::Result;

use metarepo::engine::{ConversionResult, Engine};
use metarepo::fetch::FetchLayer;
use metarepo::output::{emoji, OutputConfig};
use metarepo::suggestions;

use crate::cli::Context;

/// Engine over the system `git`, failing early when there is no manifest.
pub(crate) fn engine(ctx: &Context) -> Result<Engine> {
    let manifest = ctx.workspace.manifest_path();
    if !manifest.is_file() {
        return Err(suggestions::manifest_not_found(&manifest));
    }
    Engine::new(ctx.workspace.clone(), FetchLayer::system()).map_err(suggestions::with_hints)
}

/// Print the outcome of a conversion and fail on partial success.
pub(crate) fn report_conversion(result: &ConversionResult, out: &OutputConfig) -> Result<()> {
    println!();
    for name in &result.successful {
        println!("  {} {}", emoji(out, "✅", "[OK]"), name);
    }
    for name in &result.skipped {
        println!("  {} {} {}", emoji(out, "⏭️", "[SKIP]"), name, out.dim("(already converted)"));
    }
    for failure in &result.failed {
        println!(
            "  {} {}: {}",
            emoji(out, "❌", "[ERR]"),
            failure.name,
            out.failure(&failure.message)
        );
    }

    if result.finding_count() > 0 {
        println!(
            "\n{} {} potential secret(s) found:",
            emoji(out, "⚠️", "[WARN]"),
            result.finding_count()
        );
        for (component, findings) in &result.findings {
            for finding in findings {
                println!("   {}: {}", component, out.warning(&finding.to_string()));
            }
        }
    }

    if !result.verification.is_empty() {
        println!(
            "\n{} Verification found {} issue(s):",
            emoji(out, "⚠️", "[WARN]"),
            result.verification.len()
        );
        for issue in &result.verification {
            println!("   {}", out.warning(&issue.to_string()));
        }
    }

    if let Some(backup) = &result.backup {
        println!("\n{} Backup: {}", emoji(out, "💾", "[BACKUP]"), backup);
    }

    if result.is_success() {
        println!(
            "\n{} {} component(s) converted to {}, {} skipped",
            emoji(out, "🎉", "[DONE]"),
            result.successful.len(),
            result.target,
            result.skipped.len()
        );
        return Ok(());
    }

    let checkpoint = result.checkpoint_id.as_deref().unwrap_or_default();
    anyhow::bail!(
        "{} of {} component(s) failed\n\n\
         hint: Fix the failures and run 'metarepo resume --checkpoint {}'\n\
         hint: Resume retries failed components unless --no-retry-failed is given",
        result.failed.len(),
        result.successful.len() + result.skipped.len() + result.failed.len(),
        checkpoint
    )
}
