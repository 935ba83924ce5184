//! Default values for metarepo configuration.
//!
//! This module provides centralized default names and locations, so every
//! command resolves the same layout. Nothing below the CLI entry point reads
//! these directly; they are turned into a [`Workspace`](crate::workspace::Workspace)
//! once and passed down.

use std::path::PathBuf;

/// Directory (relative to the root) holding the manifest files.
pub const MANIFESTS_DIR: &str = "manifests";

/// Manifest file name inside the manifests directory.
pub const MANIFEST_FILE: &str = "metarepo.yaml";

/// Directory (relative to the root) holding one directory per component.
pub const COMPONENTS_DIR: &str = "components";

/// Directory (relative to the root) holding engine state.
pub const STATE_DIR: &str = ".metarepo";

/// Provenance file written into every vendored component directory.
pub const PROVENANCE_FILE: &str = ".provenance.yaml";

/// Returns the default meta-repository root.
///
/// This is the current directory. It can be overridden with the `--root`
/// CLI flag or the `METAREPO_ROOT` environment variable.
pub fn default_root() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
