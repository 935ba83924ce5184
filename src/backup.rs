//! # Backup and Restore
//!
//! Point-in-time snapshots of the manifests directory and, optionally, the
//! whole components directory:
//!
//! ```text
//! .metarepo/backups/<name>/
//!   backup.json      {backup_name, created_at, includes_components}
//!   manifests/
//!   components/      only when includes_components
//! ```
//!
//! A snapshot is assembled in a hidden staging directory and renamed into
//! place once complete, so a listed snapshot is never partial. Restores copy
//! the snapshot into a sibling of the live directory and swap it in.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::workspace::Workspace;

/// Name of the metadata file inside a snapshot.
pub const METADATA_FILE: &str = "backup.json";

/// Contents of `backup.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_name: String,
    #[serde(with = "crate::provenance::rfc3339")]
    pub created_at: DateTime<Utc>,
    pub includes_components: bool,
}

/// A snapshot on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    pub metadata: BackupMetadata,
    pub path: PathBuf,
}

impl BackupHandle {
    pub fn name(&self) -> &str {
        &self.metadata.backup_name
    }

    pub fn manifests_path(&self) -> PathBuf {
        self.path.join("manifests")
    }

    pub fn components_path(&self) -> PathBuf {
        self.path.join("components")
    }
}

/// Snapshot store rooted at the workspace's backup directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    backups_dir: PathBuf,
    manifests_dir: PathBuf,
    components_dir: PathBuf,
}

impl BackupStore {
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            backups_dir: workspace.backups_dir.clone(),
            manifests_dir: workspace.manifests_dir.clone(),
            components_dir: workspace.components_dir.clone(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.backups_dir.join(name)
    }

    fn default_name(&self, created_at: &DateTime<Utc>) -> String {
        let base = format!("backup_{}", created_at.format("%Y%m%d_%H%M%S"));
        if !filesystem::path_exists(&self.path_for(&base)) {
            return base;
        }
        (1u32..)
            .map(|n| format!("{}_{}", base, n))
            .find(|name| !filesystem::path_exists(&self.path_for(name)))
            .unwrap_or(base)
    }

    /// Take a snapshot. An explicit `name` must not already exist.
    pub fn create(&self, name: Option<&str>, include_components: bool) -> Result<BackupHandle> {
        let created_at = Utc::now();
        let name = match name {
            Some(name) => {
                validate_name(name)?;
                if filesystem::path_exists(&self.path_for(name)) {
                    return Err(Error::Backup {
                        message: format!("a backup named '{}' already exists", name),
                    });
                }
                name.to_string()
            }
            None => self.default_name(&created_at),
        };

        if !self.manifests_dir.is_dir() {
            return Err(Error::Backup {
                message: format!(
                    "manifests directory {} does not exist",
                    self.manifests_dir.display()
                ),
            });
        }

        fs::create_dir_all(&self.backups_dir).map_err(|e| backup_error("create backup directory", e))?;
        let target = self.path_for(&name);
        let staging = filesystem::sibling_path(&target, "partial");

        let metadata = BackupMetadata {
            backup_name: name,
            created_at,
            includes_components: include_components,
        };

        if let Err(e) = self.assemble(&staging, &metadata) {
            let _ = filesystem::remove_path(&staging);
            return Err(Error::Backup {
                message: format!("snapshot '{}' could not be written: {}", metadata.backup_name, e),
            });
        }
        fs::rename(&staging, &target).map_err(|e| backup_error("finalize snapshot", e))?;

        info!(
            "Created backup {}{}",
            metadata.backup_name,
            if include_components { " (with components)" } else { "" }
        );
        Ok(BackupHandle {
            metadata,
            path: target,
        })
    }

    fn assemble(&self, staging: &Path, metadata: &BackupMetadata) -> Result<()> {
        filesystem::copy_dir_recursive(&self.manifests_dir, &staging.join("manifests"))?;
        if metadata.includes_components {
            let dst = staging.join("components");
            if self.components_dir.is_dir() {
                filesystem::copy_dir_recursive(&self.components_dir, &dst)?;
            } else {
                fs::create_dir_all(&dst)?;
            }
        }
        let json = serde_json::to_vec_pretty(metadata)?;
        filesystem::write_atomic(&staging.join(METADATA_FILE), &json)
    }

    /// Every snapshot, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<BackupHandle>> {
        let entries = match fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') || !entry.file_type()?.is_dir() {
                continue;
            }
            match read_metadata(&entry.path()) {
                Ok(metadata) => backups.push(BackupHandle {
                    metadata,
                    path: entry.path(),
                }),
                Err(e) => warn!("Skipping unreadable backup {}: {}", name, e),
            }
        }

        backups.sort_by(|a, b| {
            b.metadata
                .created_at
                .cmp(&a.metadata.created_at)
                .then_with(|| b.metadata.backup_name.cmp(&a.metadata.backup_name))
        });
        Ok(backups)
    }

    /// Look up one snapshot.
    pub fn get(&self, name: &str) -> Result<Option<BackupHandle>> {
        validate_name(name)?;
        let path = self.path_for(name);
        if !path.is_dir() {
            return Ok(None);
        }
        let metadata = read_metadata(&path)?;
        Ok(Some(BackupHandle { metadata, path }))
    }

    fn require(&self, name: &str) -> Result<BackupHandle> {
        self.get(name)?.ok_or_else(|| Error::BackupNotFound {
            name: name.to_string(),
        })
    }

    /// Replace the live manifests directory (and components directory when
    /// `restore_components`) with the snapshot's copy.
    pub fn restore(&self, name: &str, restore_components: bool) -> Result<()> {
        let backup = self.require(name)?;
        self.restore_handle(&backup, restore_components)
    }

    pub fn restore_handle(&self, backup: &BackupHandle, restore_components: bool) -> Result<()> {
        let name = backup.name();
        if restore_components && !backup.metadata.includes_components {
            return Err(Error::Restore {
                name: name.to_string(),
                message: "snapshot does not include components".to_string(),
            });
        }

        debug!("Restoring manifests from {}", backup.path.display());
        filesystem::replace_dir_with_copy(&backup.manifests_path(), &self.manifests_dir).map_err(|e| {
            Error::Restore {
                name: name.to_string(),
                message: format!("manifests: {}", e),
            }
        })?;

        if restore_components {
            debug!("Restoring components from {}", backup.path.display());
            filesystem::replace_dir_with_copy(&backup.components_path(), &self.components_dir).map_err(
                |e| Error::Restore {
                    name: name.to_string(),
                    message: format!("components: {}", e),
                },
            )?;
        }

        info!(
            "Restored backup {}{}",
            name,
            if restore_components { " (with components)" } else { "" }
        );
        Ok(())
    }

    /// Remove a snapshot.
    pub fn delete(&self, name: &str) -> Result<()> {
        let backup = self.require(name)?;
        filesystem::remove_path(&backup.path).map_err(|e| Error::Backup {
            message: format!("could not delete '{}': {}", name, e),
        })?;
        info!("Deleted backup {}", name);
        Ok(())
    }
}

fn read_metadata(dir: &Path) -> Result<BackupMetadata> {
    let path = dir.join(METADATA_FILE);
    let bytes = fs::read(&path).map_err(|e| Error::Backup {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Backup {
        message: format!("malformed {}: {}", path.display(), e),
    })
}

/// Snapshot names become directory names; keep them to a single component.
fn validate_name(name: &str) -> Result<()> {
    if !filesystem::is_plain_name(name) {
        return Err(Error::Backup {
            message: format!("invalid backup name '{}'", name),
        });
    }
    Ok(())
}

fn backup_error(action: &str, e: io::Error) -> Error {
    Error::Backup {
        message: format!("failed to {}: {}", action, e),
    }
}
