//! Provenance records for vendored components.
//!
//! A provenance file sits at the top of every vendored component directory
//! and names the upstream and version it was copied from. Its presence is the
//! only signal that a component is vendored.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Component;
use crate::defaults::PROVENANCE_FILE;
use crate::error::{Error, Result};
use crate::filesystem;

/// Where a vendored tree came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub component: String,
    pub repo: String,
    pub version: String,
    #[serde(with = "rfc3339")]
    pub vendored_at: DateTime<Utc>,
}

impl Provenance {
    /// Record for `component`, stamped with the current time.
    pub fn for_component(component: &Component) -> Self {
        Self {
            component: component.name.clone(),
            repo: component.repo.clone(),
            version: component.version.clone(),
            vendored_at: Utc::now(),
        }
    }

    /// Path of the provenance file inside `component_dir`.
    pub fn path_in(component_dir: &Path) -> PathBuf {
        component_dir.join(PROVENANCE_FILE)
    }

    /// Read the record in `component_dir`; `None` if there is none.
    pub fn read(component_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(component_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_yaml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("malformed provenance file {}: {}", path.display(), e),
            hint: None,
        })?;
        Ok(Some(record))
    }

    /// Write the record into `component_dir`.
    pub fn write(&self, component_dir: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        filesystem::write_atomic(&Self::path_in(component_dir), yaml.as_bytes())
    }

    /// Whether this record describes the manifest's current pin.
    pub fn matches(&self, component: &Component) -> bool {
        self.repo == component.repo && self.version == component.version
    }
}

/// ISO-8601 timestamps with second precision and a `Z` suffix.
pub(crate) mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SecondsFormat;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Provenance::read(temp.path()).unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let component = Component::new("core", "https://example.com/core.git", "v1.2.0");
        let record = Provenance::for_component(&component);
        record.write(temp.path()).unwrap();

        let content = std::fs::read_to_string(temp.path().join(PROVENANCE_FILE)).unwrap();
        assert!(content.contains("component: core"));
        assert!(content.contains("vendored_at:"));
        assert!(content.contains('Z'));

        let reread = Provenance::read(temp.path()).unwrap().unwrap();
        assert_eq!(reread.component, "core");
        assert_eq!(reread.version, "v1.2.0");
        // Second precision survives the round trip
        assert_eq!(reread.vendored_at.timestamp(), record.vendored_at.timestamp());
        assert!(reread.matches(&component));
    }

    #[test]
    fn test_matches_detects_new_pin() {
        let component = Component::new("core", "https://example.com/core.git", "v1.2.0");
        let record = Provenance::for_component(&component);
        let bumped = Component::new("core", "https://example.com/core.git", "v1.3.0");
        assert!(!record.matches(&bumped));
    }

    #[test]
    fn test_read_accepts_offset_timestamps() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(PROVENANCE_FILE),
            "component: core\nrepo: r\nversion: v1\nvendored_at: 2024-03-01T12:00:00+02:00\n",
        )
        .unwrap();
        let record = Provenance::read(temp.path()).unwrap().unwrap();
        assert_eq!(
            record.vendored_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            "2024-03-01T10:00:00Z"
        );
    }

    #[test]
    fn test_read_malformed_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PROVENANCE_FILE), "component: [").unwrap();
        assert!(Provenance::read(temp.path()).is_err());
    }
}
