//! # Pre-flight Validation
//!
//! Read-only checks run before a conversion touches anything. Every problem
//! found is collected into a [`ValidationReport`] instead of stopping at the
//! first one, so a single run tells the user everything that needs fixing.
//!
//! Checks, in order:
//!
//! 1.  `git` is available.
//! 2.  The manifest parses and every component name is a plain directory
//!     name.
//! 3.  Each component has a recognizable `repo` and a well-formed `version`.
//! 4.  Every `depends_on` entry names a declared component.
//! 5.  The dependency graph is acyclic.
//! 6.  Optionally, existing component trees pass the secret scan.

use std::path::Path;

use log::{debug, info};
use regex::Regex;
use serde::Serialize;
use url::Url;

use crate::config::{self, Component, Manifest};
use crate::error::{Error, Result};
use crate::git;
use crate::ordering;
use crate::repository::GitOperations;
use crate::secrets::{SecretPolicy, SecretScanner};
use crate::workspace::Workspace;

const ALLOWED_SCHEMES: &[&str] = &["https", "http", "ssh", "git", "file"];

/// Outcome of pre-flight validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn new() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Turn a failing report into [`Error::Validation`].
    pub fn into_result(self) -> Result<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(Error::Validation {
                errors: self.errors,
            })
        }
    }
}

/// Pre-flight validator over one workspace.
pub struct Validator<'a> {
    workspace: &'a Workspace,
    git: &'a dyn GitOperations,
    secrets: SecretPolicy,
}

impl<'a> Validator<'a> {
    pub fn new(workspace: &'a Workspace, git: &'a dyn GitOperations) -> Self {
        Self {
            workspace,
            git,
            secrets: SecretPolicy::Skip,
        }
    }

    /// Also scan existing component trees under `policy`.
    pub fn with_secret_policy(mut self, policy: SecretPolicy) -> Self {
        self.secrets = policy;
        self
    }

    /// Run every check, returning the report and the manifest when it parsed.
    pub fn run(&self) -> (ValidationReport, Option<Manifest>) {
        let mut report = ValidationReport::new();

        match self.git.tool_version() {
            Ok(version) => debug!("Found {}", version),
            Err(e) => report.error(format!("git is not available: {}", e)),
        }

        let manifest_path = self.workspace.manifest_path();
        let manifest = match config::from_file(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => {
                report.error(e.to_string());
                return (report, None);
            }
        };

        for component in manifest.components.values() {
            if let Err(e) = check_repo(component, &self.workspace.root, &mut report) {
                report.error(e.to_string());
            }
            if let Err(e) = check_version(component) {
                report.error(e.to_string());
            }
        }

        let mut graph_ok = true;
        for component in manifest.components.values() {
            for dep in &component.depends_on {
                if !manifest.components.contains_key(dep) {
                    graph_ok = false;
                    report.error(
                        Error::UnknownDependency {
                            component: component.name.clone(),
                            dependency: dep.clone(),
                        }
                        .to_string(),
                    );
                }
            }
        }
        if graph_ok {
            if let Err(e) = ordering::resolve(&manifest) {
                report.error(e.to_string());
            }
        }

        if self.secrets.scans() {
            self.scan_components(&manifest, &mut report);
        }

        info!(
            "Pre-flight validation: {} error(s), {} warning(s)",
            report.errors.len(),
            report.warnings.len()
        );
        (report, Some(manifest))
    }

    fn scan_components(&self, manifest: &Manifest, report: &mut ValidationReport) {
        let scanner = match SecretScanner::new() {
            Ok(scanner) => scanner,
            Err(e) => {
                report.error(format!("secret scanner unavailable: {}", e));
                return;
            }
        };

        for name in manifest.names() {
            let dir = self.workspace.component_dir(name);
            if !dir.is_dir() {
                continue;
            }
            match scanner.scan_dir(&dir) {
                Ok(findings) => {
                    for finding in findings {
                        let message = format!("component '{}': potential secret at {}", name, finding);
                        if self.secrets == SecretPolicy::Fail {
                            report.error(message);
                        } else {
                            report.warning(message);
                        }
                    }
                }
                Err(e) => report.warning(format!("could not scan component '{}': {}", name, e)),
            }
        }
    }
}

const SCP_LIKE: &str = r"^[A-Za-z0-9._~-]+@[A-Za-z0-9.-]+:[^\s]+$";
const SEMVER_LIKE: &str = r"^v?\d+\.\d+";
const REF_FORBIDDEN: &str = r"[\x00-\x20\x7f~^:?*\[\\]";

fn check_repo(component: &Component, root: &Path, report: &mut ValidationReport) -> Result<()> {
    let repo = component.repo.trim();
    let name = &component.name;

    if repo.is_empty() {
        report.error(format!("component '{}' has no repo", name));
        return Ok(());
    }

    if repo.contains("://") {
        match Url::parse(repo) {
            Ok(url) if !ALLOWED_SCHEMES.contains(&url.scheme()) => report.error(format!(
                "component '{}' uses unsupported repo scheme '{}'",
                name,
                url.scheme()
            )),
            Ok(url) if url.scheme() != "file" && url.host_str().is_none() => {
                report.error(format!("component '{}' repo URL has no host: {}", name, repo))
            }
            Ok(_) => {}
            Err(e) => report.error(format!("component '{}' has an invalid repo URL: {}", name, e)),
        }
        return Ok(());
    }

    if Regex::new(SCP_LIKE)?.is_match(repo) {
        return Ok(());
    }

    // Anything else is a filesystem path
    let path = Path::new(repo);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    if !resolved.exists() {
        report.warning(format!(
            "component '{}' repo '{}' is neither a URL nor an existing path",
            name, repo
        ));
    }
    Ok(())
}

/// Check that a component's `version` names something git can resolve.
pub fn check_version(component: &Component) -> Result<()> {
    let version = component.version.trim();
    let invalid = |message: &str| Error::InvalidVersion {
        component: component.name.clone(),
        version: component.version.clone(),
        message: message.to_string(),
    };

    if version.is_empty() {
        return Err(invalid("version is empty"));
    }
    if version != component.version {
        return Err(invalid("version has surrounding whitespace"));
    }
    if Regex::new(SEMVER_LIKE)?.is_match(version) {
        return match git::parse_semver_tag(version) {
            Some(_) => Ok(()),
            None => Err(invalid("looks like a semantic version but is not valid semver")),
        };
    }
    if git::looks_like_commit(version) {
        return Ok(());
    }
    if is_valid_ref_name(version)? {
        Ok(())
    } else {
        Err(invalid("not a valid git ref name"))
    }
}

/// A subset of `git check-ref-format` rules for branch and tag names.
fn is_valid_ref_name(name: &str) -> Result<bool> {
    Ok(!(name == "@"
        || name.starts_with('/')
        || name.ends_with('/')
        || name.starts_with('-')
        || name.ends_with('.')
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("//")
        || name.contains("@{")
        || name.split('/').any(|part| part.starts_with('.'))
        || Regex::new(REF_FORBIDDEN)?.is_match(name)))
}
