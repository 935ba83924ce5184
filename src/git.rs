use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use semver::Version;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Version-control metadata entries removed from vendored trees.
pub const VCS_METADATA: &[&str] = &[".git", ".hg", ".svn", ".bzr"];

/// Check that the `git` binary can be executed, returning its version line.
pub fn git_version() -> Result<String> {
    let output = Command::new("git")
        .arg("--version")
        .output()
        .map_err(|e| Error::ToolValidation {
            tool: "git".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ToolValidation {
            tool: "git".to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whether a version string names a commit rather than a branch or tag.
pub fn looks_like_commit(version: &str) -> bool {
    (7..=40).contains(&version.len()) && version.chars().all(|c| c.is_ascii_hexdigit())
}

/// Check out `url` at `version` into `target_dir` as a live working copy.
///
/// Branches and tags use a shallow `git clone --branch`. Commit ids are
/// fetched directly, since `--branch` does not accept them. This uses the
/// system git command, which picks up SSH keys, credential helpers and any
/// authentication configured in ~/.gitconfig.
pub fn clone_at(url: &str, version: &str, target_dir: &Path) -> Result<()> {
    // git won't clone into an existing non-empty directory
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    if looks_like_commit(version) {
        return fetch_commit(url, version, target_dir);
    }

    let output = Command::new("git")
        .args(["clone", "--quiet", "--depth=1", "--branch", version, url])
        .arg(target_dir)
        .output()
        .map_err(|e| fetch_error(url, version, e.to_string()))?;

    if !output.status.success() {
        return Err(fetch_error(
            url,
            version,
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }

    Ok(())
}

fn fetch_commit(url: &str, commit: &str, target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;

    let steps: [&[&str]; 4] = [
        &["init", "--quiet"],
        &["remote", "add", "origin", url],
        &["fetch", "--quiet", "--depth=1", "origin", commit],
        &["checkout", "--quiet", "--detach", "FETCH_HEAD"],
    ];

    for args in steps {
        let output = run_git(args, target_dir).map_err(|e| fetch_error(url, commit, e.to_string()))?;
        if !output.status.success() {
            return Err(fetch_error(
                url,
                commit,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
    }

    Ok(())
}

fn run_git(args: &[&str], dir: &Path) -> std::io::Result<Output> {
    Command::new("git").args(args).current_dir(dir).output()
}

/// Build a fetch error, attaching a hint for common authentication failures.
fn fetch_error(url: &str, version: &str, stderr: String) -> Error {
    let (hint, permanent) = if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        (
            Some(
                "Make sure you have access to the repository: SSH key in ssh-agent, \
                 git credentials, or a personal access token"
                    .to_string(),
            ),
            true,
        )
    } else if stderr.contains("not found in upstream") || stderr.contains("couldn't find remote ref")
    {
        (
            Some(format!("Check that '{}' exists in the upstream repository", version)),
            true,
        )
    } else {
        (None, false)
    };

    Error::Fetch {
        url: url.to_string(),
        r#ref: version.to_string(),
        message: stderr.trim().to_string(),
        hint,
        permanent,
    }
}

/// Remove version-control metadata at any depth below `dir`.
///
/// Returns the number of entries removed.
pub fn strip_vcs_metadata(dir: &Path) -> Result<usize> {
    let mut doomed = Vec::new();
    let mut walker = WalkDir::new(dir).min_depth(1).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry?;
        let is_vcs = entry
            .file_name()
            .to_str()
            .is_some_and(|name| VCS_METADATA.contains(&name));
        if is_vcs {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            doomed.push(entry.into_path());
        }
    }

    for path in &doomed {
        log::debug!("Stripping {}", path.display());
        crate::filesystem::remove_path(path)?;
    }

    Ok(doomed.len())
}

/// Whether `dir` is a live working copy.
pub fn is_checkout(dir: &Path) -> bool {
    crate::filesystem::path_exists(&dir.join(".git"))
}

/// Parse a tag string into a semantic version
pub fn parse_semver_tag(tag: &str) -> Option<Version> {
    // Common tag formats: v1.0.0, 1.0.0
    let version_str = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(version_str).ok()
}
