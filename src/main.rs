//! # metarepo CLI
//!
//! Binary entry point for the `metarepo` command-line tool.
//!
//! Its responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and resolving the workspace layout.
//! - Executing the requested command and turning errors into output.
//!
//! Conversion logic lives in the library crate; the binary is a thin wrapper
//! around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
