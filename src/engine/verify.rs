//! Post-conversion verification.
//!
//! Compares what is on disk with what the manifest says should be there.
//! Problems are returned as a list for the caller to report; verification
//! never fails a conversion.

use std::fmt;

use serde::Serialize;

use crate::config::{Manifest, Mode};
use crate::git;
use crate::provenance::Provenance;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum IssueKind {
    /// `meta.mode` disagrees with the mode being verified
    ModeMismatch { expected: Mode, found: Mode },
    MissingDirectory,
    MissingProvenance,
    /// The provenance file exists but cannot be read as a record
    MalformedProvenance { message: String },
    /// Provenance names a different upstream or version than the manifest
    StaleProvenance { recorded: String, expected: String },
    /// A vendored tree still carries version-control metadata
    VcsMetadataPresent,
    /// A referenced component carries a provenance record
    UnexpectedProvenance,
    /// A referenced component is not a live checkout
    NotACheckout,
}

/// One discrepancy between disk and manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationIssue {
    /// Empty for manifest-level issues
    pub component: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::ModeMismatch { expected, found } => {
                write!(f, "manifest mode is {} but {} was expected", found, expected)
            }
            IssueKind::MissingDirectory => write!(f, "{}: component directory is missing", self.component),
            IssueKind::MissingProvenance => write!(f, "{}: no provenance record", self.component),
            IssueKind::MalformedProvenance { message } => {
                write!(f, "{}: unreadable provenance record: {}", self.component, message)
            }
            IssueKind::StaleProvenance { recorded, expected } => write!(
                f,
                "{}: provenance records {} but manifest pins {}",
                self.component, recorded, expected
            ),
            IssueKind::VcsMetadataPresent => {
                write!(f, "{}: vendored tree contains version-control metadata", self.component)
            }
            IssueKind::UnexpectedProvenance => {
                write!(f, "{}: referenced component has a provenance record", self.component)
            }
            IssueKind::NotACheckout => write!(f, "{}: not a live checkout", self.component),
        }
    }
}

/// Check every component of `manifest` against `target`.
pub fn verify(workspace: &Workspace, manifest: &Manifest, target: Mode) -> Vec<VerificationIssue> {
    let mut issues = Vec::new();

    if manifest.mode() != target {
        issues.push(VerificationIssue {
            component: String::new(),
            kind: IssueKind::ModeMismatch {
                expected: target,
                found: manifest.mode(),
            },
        });
    }

    for component in manifest.components.values() {
        let dir = workspace.component_dir(&component.name);
        let mut push = |kind| {
            issues.push(VerificationIssue {
                component: component.name.clone(),
                kind,
            })
        };

        if !dir.is_dir() {
            push(IssueKind::MissingDirectory);
            continue;
        }

        let record = match Provenance::read(&dir) {
            Ok(record) => record,
            Err(e) => {
                push(IssueKind::MalformedProvenance { message: e.to_string() });
                if target == Mode::Reference && !git::is_checkout(&dir) {
                    push(IssueKind::NotACheckout);
                }
                continue;
            }
        };
        match target {
            Mode::Vendored => {
                match record {
                    None => push(IssueKind::MissingProvenance),
                    Some(record) if !record.matches(component) => push(IssueKind::StaleProvenance {
                        recorded: format!("{}@{}", record.repo, record.version),
                        expected: format!("{}@{}", component.repo, component.version),
                    }),
                    Some(_) => {}
                }
                if git::VCS_METADATA.iter().any(|entry| dir.join(entry).exists()) {
                    push(IssueKind::VcsMetadataPresent);
                }
            }
            Mode::Reference => {
                if record.is_some() {
                    push(IssueKind::UnexpectedProvenance);
                }
                if !git::is_checkout(&dir) {
                    push(IssueKind::NotACheckout);
                }
            }
        }
    }

    issues
}
