//! # Verify Command Implementation
//!
//! Read-only check that every component on disk matches the manifest's
//! declared mode. Exits non-zero when any issue is found.

use anyhow::Result;
use clap::Args;

use metarepo::config;
use metarepo::output::emoji;
use metarepo::suggestions;

use crate::cli::Context;

/// Check that components on disk match the manifest's mode
#[derive(Args, Debug)]
pub struct VerifyArgs {}

/// Execute the `verify` command.
pub fn execute(_args: VerifyArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let engine = super::engine(ctx)?;
    let manifest = config::from_file(&ctx.workspace.manifest_path()).map_err(suggestions::with_hints)?;

    println!(
        "{} Verifying {} component(s) in {} mode",
        emoji(out, "🔍", "[SCAN]"),
        manifest.components.len(),
        manifest.mode()
    );

    let issues = engine.verify().map_err(suggestions::with_hints)?;
    if issues.is_empty() {
        println!("{} All components match the manifest", emoji(out, "✅", "[OK]"));
        return Ok(());
    }

    for issue in &issues {
        println!("   {} {}", emoji(out, "❌", "[ERR]"), out.failure(&issue.to_string()));
    }
    anyhow::bail!("Verification found {} issue(s)", issues.len())
}
