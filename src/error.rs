//! # Error Handling
//!
//! This module defines the centralized error type for the `metarepo`
//! library. It uses `thiserror` to build one `Error` enum covering every
//! failure mode of a conversion, with messages that carry enough context to
//! act on.
//!
//! ## Taxonomy
//!
//! - **Prerequisite errors** (`ToolValidation`, `ConfigParse`,
//!   `InvalidVersion`, `CycleDetected`, `UnknownDependency`, `Validation`)
//!   block a conversion before anything is mutated.
//! - **Fetch errors** (`Fetch`, `FetchExhausted`) are transient. The fetch
//!   layer retries `Fetch` and reports `FetchExhausted` once the attempt
//!   budget is spent.
//! - **`SecretDetected`** is raised only when secret scanning is configured
//!   to fail; otherwise findings are warnings.
//! - **Component errors** (`MissingProvenance`, `Component`) are recorded in
//!   the checkpoint. `ConversionAborted` stops the whole conversion.
//! - **Backup and restore errors** are fatal to the requested operation.
//!   `RolledBack` reports a failed conversion that was undone from a backup.
//!
//! Wrapped library errors (`Io`, `Yaml`, `Json`, and friends) convert
//! automatically through `#[from]`.

use thiserror::Error;

use crate::secrets::Finding;

/// Main error type for metarepo operations
#[derive(Error, Debug)]
pub enum Error {
    /// The manifest could not be parsed or is structurally invalid.
    #[error("Manifest parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the manifest
        hint: Option<String>,
    },

    /// A component's pinned version is not a recognizable ref.
    #[error("Invalid version for component '{component}': {version} ({message})")]
    InvalidVersion {
        component: String,
        version: String,
        message: String,
    },

    /// A circular dependency was detected between components.
    #[error("Cycle detected in component dependencies: {cycle}")]
    CycleDetected { cycle: String },

    /// A component depends on a name that is not declared in the manifest.
    #[error("Component '{component}' depends on undeclared component '{dependency}'")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    /// A required external tool is missing or unusable.
    #[error("Tool validation error: {tool} - {message}")]
    ToolValidation { tool: String, message: String },

    /// Pre-flight validation reported one or more errors.
    #[error("Pre-flight validation failed with {} error(s):\n  - {}", errors.len(), errors.join("\n  - "))]
    Validation { errors: Vec<String> },

    /// A single fetch attempt failed.
    #[error("Fetch error for {url}@{r#ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Fetch {
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the fetch issue
        hint: Option<String>,
        /// Retrying cannot help (bad credentials, missing ref)
        permanent: bool,
    },

    /// Every attempt allowed by the retry policy failed.
    #[error("Fetch of {url}@{r#ref} failed after {attempts} attempt(s): {last_error}")]
    FetchExhausted {
        url: String,
        r#ref: String,
        attempts: u32,
        last_error: String,
    },

    /// A git command other than clone failed.
    #[error("Git command failed in {dir}: {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// Secret scanning found credential-like content and policy forbids it.
    #[error("Secret scan found {} potential secret(s) in component '{component}'", findings.len())]
    SecretDetected {
        component: String,
        findings: Vec<Finding>,
    },

    /// A vendored component has no provenance record to reconstitute from.
    #[error("Component '{component}' has no provenance record at {path}")]
    MissingProvenance { component: String, path: String },

    /// Any other failure while converting a single component.
    #[error("Component '{component}' failed: {source}")]
    Component {
        component: String,
        #[source]
        source: Box<Error>,
    },

    /// The conversion stopped at a failing component.
    #[error("Conversion aborted at component '{component}' (checkpoint {checkpoint_id}): {source}")]
    ConversionAborted {
        component: String,
        checkpoint_id: String,
        #[source]
        source: Box<Error>,
    },

    /// The conversion failed and the workspace was restored from a backup.
    #[error("Conversion failed and was rolled back from backup '{backup}': {source}")]
    RolledBack {
        backup: String,
        #[source]
        source: Box<Error>,
    },

    /// A checkpoint record could not be read, written, or is malformed.
    #[error("Checkpoint error: {message}")]
    Checkpoint { message: String },

    /// No checkpoint exists under the requested id (or at all).
    #[error("No checkpoint found{}", id.as_ref().map(|i| format!(" with id '{}'", i)).unwrap_or_default())]
    CheckpointNotFound { id: Option<String> },

    /// A backup snapshot could not be created or read.
    #[error("Backup error: {message}")]
    Backup { message: String },

    /// No backup exists under the requested name.
    #[error("Backup not found: {name}")]
    BackupNotFound { name: String },

    /// Restoring a backup snapshot failed.
    #[error("Restore from backup '{name}' failed: {message}")]
    Restore { name: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// An ignore-file error, wrapped from `ignore::Error`.
    #[error("Ignore pattern error: {0}")]
    Ignore(#[from] ignore::Error),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),
}

impl Error {
    /// Wrap this error as a failure of `component`.
    ///
    /// Errors that already name their component are returned unchanged.
    pub fn for_component(self, component: &str) -> Error {
        match self {
            Error::SecretDetected { .. }
            | Error::MissingProvenance { .. }
            | Error::Component { .. } => self,
            other => Error::Component {
                component: component.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Whether the fetch layer should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Fetch { permanent: false, .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "missing 'components' table".to_string(),
            hint: Some("Add a 'components:' mapping".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Manifest parsing error"));
        assert!(display.contains("missing 'components' table"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn test_error_display_fetch() {
        let error = Error::Fetch {
            url: "https://github.com/test/repo.git".to_string(),
            r#ref: "v1.0.0".to_string(),
            message: "Connection reset".to_string(),
            hint: None,
            permanent: false,
        };
        let display = format!("{}", error);
        assert!(display.contains("https://github.com/test/repo.git@v1.0.0"));
        assert!(display.contains("Connection reset"));
        assert!(!display.contains("hint:"));
    }

    #[test]
    fn test_error_display_fetch_exhausted() {
        let error = Error::FetchExhausted {
            url: "https://example.com/a.git".to_string(),
            r#ref: "main".to_string(),
            attempts: 3,
            last_error: "timeout".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("after 3 attempt(s)"));
        assert!(display.contains("timeout"));
    }

    #[test]
    fn test_error_display_cycle_detected() {
        let error = Error::CycleDetected {
            cycle: "a -> b -> a".to_string(),
        };
        assert!(error.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_error_display_validation_lists_errors() {
        let error = Error::Validation {
            errors: vec!["first".to_string(), "second".to_string()],
        };
        let display = error.to_string();
        assert!(display.contains("2 error(s)"));
        assert!(display.contains("- first"));
        assert!(display.contains("- second"));
    }

    #[test]
    fn test_error_display_checkpoint_not_found() {
        let named = Error::CheckpointNotFound {
            id: Some("checkpoint_1".to_string()),
        };
        assert!(named.to_string().contains("'checkpoint_1'"));

        let latest = Error::CheckpointNotFound { id: None };
        assert_eq!(latest.to_string(), "No checkpoint found");
    }

    #[test]
    fn test_for_component_wraps_generic_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let wrapped = Error::from(io).for_component("api");
        match wrapped {
            Error::Component { component, source } => {
                assert_eq!(component, "api");
                assert!(matches!(*source, Error::Io(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_for_component_keeps_component_errors() {
        let error = Error::MissingProvenance {
            component: "api".to_string(),
            path: "components/api/.provenance.yaml".to_string(),
        };
        assert!(matches!(
            error.for_component("api"),
            Error::MissingProvenance { .. }
        ));
    }

    #[test]
    fn test_is_transient() {
        let fetch = Error::Fetch {
            url: "u".to_string(),
            r#ref: "r".to_string(),
            message: "m".to_string(),
            hint: None,
            permanent: false,
        };
        assert!(fetch.is_transient());
        let auth = Error::Fetch {
            url: "u".to_string(),
            r#ref: "r".to_string(),
            message: "Authentication failed".to_string(),
            hint: Some("check credentials".to_string()),
            permanent: true,
        };
        assert!(!auth.is_transient());
        assert!(!Error::CycleDetected {
            cycle: "a".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(error.to_string().contains("YAML error"));
    }
}
