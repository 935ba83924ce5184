//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and a git mock
//! to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_upstream("core", &[("src/lib.rs", "pub fn core() {}\n")])
//!         .with_manifest("reference", &[("core", &[])]);
//!     // ... test code
//! }
//! ```

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_fs::prelude::*;
use walkdir::WalkDir;

use metarepo::engine::Engine;
use metarepo::error::{Error, Result};
use metarepo::fetch::{FetchLayer, RetryPolicy};
use metarepo::filesystem;
use metarepo::repository::GitOperations;
use metarepo::workspace::Workspace;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::{snapshot_tree, GitRecorder, TestFixture};
}

/// Version every fixture component is pinned at.
pub const PINNED: &str = "v1.0.0";

/// Records calls and injects failures into [`FixtureGit`].
#[derive(Clone, Default)]
pub struct GitRecorder {
    calls: Arc<AtomicUsize>,
    // upstream directory name -> remaining failures (usize::MAX = forever)
    failures: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl GitRecorder {
    /// Number of checkouts attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every checkout of `name` fail.
    pub fn fail(&self, name: &str) {
        self.failures.lock().unwrap().insert(name.to_string(), usize::MAX);
    }

    /// Make the next `times` checkouts of `name` fail.
    pub fn flaky(&self, name: &str, times: usize) {
        self.failures.lock().unwrap().insert(name.to_string(), times);
    }

    /// Let checkouts of `name` succeed again.
    pub fn heal(&self, name: &str) {
        self.failures.lock().unwrap().remove(name);
    }

    fn should_fail(&self, name: &str) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(name) {
            Some(0) | None => false,
            Some(remaining) => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                true
            }
        }
    }
}

/// Treats the URL as a local directory: checking out copies it and adds a
/// `.git` directory recording the requested version.
pub struct FixtureGit {
    recorder: GitRecorder,
}

impl GitOperations for FixtureGit {
    fn checkout(&self, url: &str, version: &str, target_dir: &Path) -> Result<()> {
        self.recorder.calls.fetch_add(1, Ordering::SeqCst);
        let source = Path::new(url);
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.recorder.should_fail(&name) {
            return Err(Error::Fetch {
                url: url.to_string(),
                r#ref: version.to_string(),
                message: "connection reset by peer".to_string(),
                hint: None,
                permanent: false,
            });
        }

        if target_dir.exists() {
            fs::remove_dir_all(target_dir)?;
        }
        filesystem::copy_dir_recursive(source, target_dir)?;
        write_git_dir(target_dir, version);
        Ok(())
    }

    fn tool_version(&self) -> Result<String> {
        Ok("git version 2.43.0".to_string())
    }
}

fn write_git_dir(dir: &Path, version: &str) {
    fs::create_dir_all(dir.join(".git")).unwrap();
    fs::write(dir.join(".git/HEAD"), format!("{}\n", version)).unwrap();
}

/// A temporary directory holding a meta-repository under `repo/` and the
/// upstream trees its components point at under `upstream/`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Meta-repository root.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("repo")
    }

    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.root())
    }

    /// Location of an upstream tree.
    pub fn upstream(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("upstream").join(name)
    }

    /// Add an upstream tree with the given files.
    pub fn with_upstream(self, name: &str, files: &[(&str, &str)]) -> Self {
        for (path, content) in files {
            self.temp_dir
                .child(format!("upstream/{}/{}", name, path))
                .write_str(content)
                .expect("Failed to write upstream file");
        }
        self
    }

    /// Write a manifest whose components point at their upstream trees.
    pub fn with_manifest(self, mode: &str, components: &[(&str, &[&str])]) -> Self {
        let mut yaml = format!("meta:\n  mode: {}\ncomponents:\n", mode);
        for (name, deps) in components {
            yaml.push_str(&format!(
                "  {}:\n    repo: '{}'\n    version: {}\n",
                name,
                self.upstream(name).display(),
                PINNED
            ));
            if !deps.is_empty() {
                yaml.push_str(&format!("    depends_on: [{}]\n", deps.join(", ")));
            }
        }
        self.with_raw_manifest(&yaml)
    }

    /// Write the manifest verbatim.
    pub fn with_raw_manifest(self, yaml: &str) -> Self {
        self.temp_dir
            .child("repo/manifests/metarepo.yaml")
            .write_str(yaml)
            .expect("Failed to write manifest");
        self
    }

    /// Lay out a component as a live checkout of its upstream.
    pub fn with_checkout(self, name: &str) -> Self {
        let dir = self.workspace().component_dir(name);
        filesystem::copy_dir_recursive(&self.upstream(name), &dir).expect("Failed to copy upstream");
        write_git_dir(&dir, PINNED);
        self
    }

    /// Add a file inside a component directory.
    pub fn with_component_file(self, name: &str, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(format!("repo/components/{}/{}", name, path))
            .write_str(content)
            .expect("Failed to write component file");
        self
    }

    pub fn manifest(&self) -> String {
        fs::read_to_string(self.workspace().manifest_path()).expect("Failed to read manifest")
    }

    /// Engine over [`FixtureGit`], retrying each fetch up to `attempts` times.
    pub fn engine_with_attempts(&self, attempts: u32) -> (Engine, GitRecorder) {
        let recorder = GitRecorder::default();
        let git = FixtureGit { recorder: recorder.clone() };
        let fetch = FetchLayer::new(Box::new(git), RetryPolicy::immediate(attempts));
        let engine = Engine::new(self.workspace(), fetch).expect("Failed to build engine");
        (engine, recorder)
    }

    pub fn engine(&self) -> (Engine, GitRecorder) {
        self.engine_with_attempts(1)
    }

    /// Command for the `metarepo` binary rooted at this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("metarepo");
        cmd.current_dir(self.temp_dir.path())
            .env_remove("METAREPO_ROOT")
            .env_remove("METAREPO_MANIFESTS")
            .env_remove("RUST_LOG")
            .arg("--root")
            .arg(self.root())
            .arg("--color")
            .arg("never");
        cmd
    }

    /// Path inside the meta-repository.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Every file under `dir` with its bytes, keyed by relative path.
pub fn snapshot_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(dir).unwrap().to_path_buf();
            (relative, fs::read(entry.path()).unwrap())
        })
        .collect()
}

/// Component names recorded in each state of the only checkpoint on disk.
pub fn checkpoint_states(workspace: &Workspace) -> (BTreeSet<String>, BTreeSet<String>, BTreeSet<String>) {
    let store = metarepo::checkpoint::CheckpointStore::new(&workspace.checkpoints_dir);
    let checkpoint = store
        .load_latest()
        .unwrap()
        .expect("expected a checkpoint on disk");
    (
        checkpoint.completed_components,
        checkpoint.failed_components,
        checkpoint.pending_components,
    )
}

/// Create a real git repository at `dir` with one commit tagged `tag`.
///
/// Only used by tests gated behind the `integration-tests` feature.
pub fn init_git_repo(dir: &Path, files: &[(&str, &str)], tag: &str) {
    fs::create_dir_all(dir).unwrap();
    for (path, content) in files {
        let full = dir.join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    let steps: [&[&str]; 5] = [
        &["init", "--quiet"],
        &["add", "."],
        &[
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@example.com",
            "commit",
            "--quiet",
            "-m",
            "initial",
        ],
        &["tag", tag],
        &["config", "uploadpack.allowReachableSHA1InWant", "true"],
    ];
    for args in steps {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .expect("git must be installed for integration tests");
        assert!(status.success(), "git {:?} failed", args);
    }
}
