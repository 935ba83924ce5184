//! # Manifest Schema and Parsing
//!
//! This module defines the typed records behind `manifests/metarepo.yaml`
//! and the functions that read and rewrite it.
//!
//! ```yaml
//! meta:
//!   mode: reference
//! components:
//!   core:
//!     repo: https://github.com/example/core.git
//!     version: v1.2.0
//!     type: rust
//!   api:
//!     repo: https://github.com/example/api.git
//!     version: v0.4.1
//!     depends_on: [core]
//! ```
//!
//! Keys the engine does not understand are kept in `extra` maps so that
//! rewriting the mode flag never drops user content. `repo` and `version`
//! default to empty strings rather than failing the parse, so pre-flight
//! validation can report every missing field at once.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filesystem;

/// How components are represented in the meta-repository.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Each component is a live, pinned checkout of its upstream
    #[default]
    Reference,
    /// Each component is an immutable copy of its upstream source
    Vendored,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Reference => "reference",
            Mode::Vendored => "vendored",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reference" => Ok(Mode::Reference),
            "vendored" => Ok(Mode::Vendored),
            other => Err(Error::ConfigParse {
                message: format!("unknown mode '{}'", other),
                hint: Some("Use 'reference' or 'vendored'".to_string()),
            }),
        }
    }
}

/// The `meta` table of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Current representation of every component
    #[serde(default)]
    pub mode: Mode,
    /// Unrecognized keys, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One component declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Component name, taken from its key in the `components` table
    #[serde(skip)]
    pub name: String,
    /// Upstream location (URL, scp-style address, or local path)
    #[serde(default)]
    pub repo: String,
    /// Pinned ref: a semver tag, branch name, or commit id
    #[serde(default)]
    pub version: String,
    /// Ecosystem tag (e.g. `rust`, `node`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<String>,
    /// Optional build target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_target: Option<String>,
    /// Names of components this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Unrecognized keys, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Component {
    /// Convenience constructor used by tests and tooling.
    pub fn new(name: &str, repo: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            repo: repo.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    /// Builder-style dependency list.
    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// The whole manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    /// Unrecognized top-level keys, preserved on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Manifest {
    /// Build a manifest from components, keyed by their names.
    pub fn from_components(mode: Mode, components: impl IntoIterator<Item = Component>) -> Self {
        let components = components
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        Self {
            meta: Meta {
                mode,
                extra: BTreeMap::new(),
            },
            components,
            extra: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.meta.mode
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Component names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Parse manifest YAML.
pub fn parse(yaml: &str) -> Result<Manifest> {
    if yaml.trim().is_empty() {
        return Err(Error::ConfigParse {
            message: "manifest is empty".to_string(),
            hint: Some("Declare at least a 'components:' table".to_string()),
        });
    }

    let mut manifest: Manifest = serde_yaml::from_str(yaml).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: None,
    })?;

    // Names become directories under `components/`
    let invalid: Vec<&str> = manifest
        .names()
        .filter(|name| !filesystem::is_plain_name(name))
        .collect();
    if !invalid.is_empty() {
        return Err(Error::ConfigParse {
            message: format!(
                "invalid component name(s): {}",
                invalid
                    .iter()
                    .map(|n| format!("'{}'", n))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            hint: Some(
                "Component names must not be empty, start with '.', or contain '/' or '\\'"
                    .to_string(),
            ),
        });
    }

    for (name, component) in manifest.components.iter_mut() {
        component.name = name.clone();
    }

    Ok(manifest)
}

/// Read and parse the manifest at `path`.
pub fn from_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("cannot read {}: {}", path.display(), e),
        hint: None,
    })?;
    parse(&content)
}

/// Write the manifest to `path` atomically.
pub fn write(path: &Path, manifest: &Manifest) -> Result<()> {
    filesystem::write_atomic(path, manifest.to_yaml()?.as_bytes())
}

/// Rewrite only the mode flag, returning the previous mode.
pub fn set_mode(path: &Path, mode: Mode) -> Result<Mode> {
    let mut manifest = from_file(path)?;
    let previous = manifest.meta.mode;
    if previous != mode {
        manifest.meta.mode = mode;
        write(path, &manifest)?;
        log::info!("Manifest mode set to {} (was {})", mode, previous);
    }
    Ok(previous)
}
