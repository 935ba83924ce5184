//! # Source Acquisition Seam
//!
//! The engine never calls `git` directly. It goes through the
//! [`GitOperations`] trait, so the real subprocess-backed implementation can
//! be swapped for a mock in tests, simulating slow, flaky or failing
//! upstreams without touching the network.
//!
//! [`DefaultGitOperations`] wraps the functions in [`crate::git`]. Retrying
//! is not done here; see [`crate::fetch::FetchLayer`].

use std::path::Path;

use crate::error::Result;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Produces a live checkout of `url` at `version` in `target_dir`.
    ///
    /// The resulting tree keeps its version-control metadata; the
    /// materializer strips it when vendoring.
    fn checkout(&self, url: &str, version: &str, target_dir: &Path) -> Result<()>;

    /// Returns the tool's version string, or an error if it is unavailable.
    fn tool_version(&self) -> Result<String>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn checkout(&self, url: &str, version: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone_at(url, version, target_dir)
    }

    fn tool_version(&self) -> Result<String> {
        crate::git::git_version()
    }
}
