//! # Validate Command Implementation
//!
//! Runs the pre-flight checks a conversion would run and prints the report.
//! This command is read-only.

use anyhow::Result;
use clap::Args;

use metarepo::output::emoji;
use metarepo::secrets::SecretPolicy;

use crate::cli::Context;

/// Run pre-flight validation without converting
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also scan existing component trees for credentials
    #[arg(long)]
    pub check_secrets: bool,

    /// With --check-secrets, report findings as errors
    #[arg(long, requires = "check_secrets")]
    pub fail_on_secrets: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, ctx: &Context) -> Result<()> {
    let out = &ctx.out;
    let engine = super::engine(ctx)?;

    println!(
        "{} Validating manifest: {}",
        emoji(out, "🔍", "[SCAN]"),
        ctx.workspace.display_path(&ctx.workspace.manifest_path()).display()
    );

    let policy = SecretPolicy::from_flags(args.check_secrets, args.fail_on_secrets);
    let (report, manifest) = engine.validate(policy);

    if let Some(manifest) = &manifest {
        println!("\n{} Manifest Summary:", emoji(out, "📊", "[INFO]"));
        println!("   Mode: {}", manifest.mode());
        println!("   Components: {}", manifest.components.len());
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("{} {}", emoji(out, "⚠️", "[WARN]"), out.warning(warning));
        }
    }

    if report.valid {
        println!("\n{} Manifest is valid", emoji(out, "✅", "[OK]"));
        return Ok(());
    }

    println!();
    for error in &report.errors {
        println!("{} {}", emoji(out, "❌", "[ERR]"), error);
    }
    anyhow::bail!("Validation failed with {} error(s)", report.errors.len())
}
