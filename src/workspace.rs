//! # Workspace Layout
//!
//! A [`Workspace`] holds every directory root the engine touches. It is
//! built once at the process entry point and handed to each subsystem's
//! constructor, so no module reaches for a fixed global path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::Result;

/// Directory roots of one meta-repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Meta-repository root
    pub root: PathBuf,
    /// Directory holding the manifest; backed up and restored as a whole
    pub manifests_dir: PathBuf,
    /// Directory holding one subdirectory per component
    pub components_dir: PathBuf,
    /// Checkpoint records
    pub checkpoints_dir: PathBuf,
    /// Backup snapshots
    pub backups_dir: PathBuf,
    /// Staging area for fetches; lives on the same filesystem as the
    /// components so trees can be renamed into place
    pub scratch_dir: PathBuf,
}

impl Workspace {
    /// Conventional layout under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state = root.join(defaults::STATE_DIR);
        Self {
            manifests_dir: root.join(defaults::MANIFESTS_DIR),
            components_dir: root.join(defaults::COMPONENTS_DIR),
            checkpoints_dir: state.join("checkpoints"),
            backups_dir: state.join("backups"),
            scratch_dir: state.join("scratch"),
            root,
        }
    }

    /// Replace the manifests directory.
    pub fn with_manifests_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifests_dir = dir.into();
        self
    }

    /// Path of the manifest file.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifests_dir.join(defaults::MANIFEST_FILE)
    }

    /// Directory of a single component.
    pub fn component_dir(&self, name: &str) -> PathBuf {
        self.components_dir.join(name)
    }

    /// Provenance file location for a component.
    pub fn provenance_path(&self, name: &str) -> PathBuf {
        self.component_dir(name).join(defaults::PROVENANCE_FILE)
    }

    /// Create the state directories if they are missing.
    pub fn ensure_state_dirs(&self) -> Result<()> {
        for dir in [&self.checkpoints_dir, &self.backups_dir, &self.scratch_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path relative to the root, for display.
    pub fn display_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
