//! # Checkpoint Store
//!
//! Durable record of an in-flight conversion. One JSON file per checkpoint
//! lives in the workspace's checkpoint directory:
//!
//! ```json
//! {
//!   "checkpoint_id": "checkpoint_20240301_120000",
//!   "target_mode": "vendored",
//!   "manifests_dir": "/repo/manifests",
//!   "created_at": "2024-03-01T12:00:00Z",
//!   "completed_components": ["core"],
//!   "failed_components": [],
//!   "pending_components": ["api", "web"]
//! }
//! ```
//!
//! Every component name is in exactly one of the three sets. Each mutation
//! re-establishes that and is written to disk before it returns, so the file
//! is always the source of truth for resuming after an interruption.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::error::{Error, Result};
use crate::filesystem;

/// Progress of one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub checkpoint_id: String,
    pub target_mode: Mode,
    pub manifests_dir: PathBuf,
    #[serde(with = "crate::provenance::rfc3339")]
    pub created_at: DateTime<Utc>,
    pub completed_components: BTreeSet<String>,
    pub failed_components: BTreeSet<String>,
    pub pending_components: BTreeSet<String>,
}

/// Which of the three sets a component is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Completed,
    Failed,
    Pending,
}

impl Checkpoint {
    /// Every component tracked by this checkpoint.
    pub fn all_components(&self) -> BTreeSet<String> {
        self.completed_components
            .iter()
            .chain(&self.failed_components)
            .chain(&self.pending_components)
            .cloned()
            .collect()
    }

    pub fn state_of(&self, name: &str) -> Option<ComponentState> {
        if self.completed_components.contains(name) {
            Some(ComponentState::Completed)
        } else if self.failed_components.contains(name) {
            Some(ComponentState::Failed)
        } else if self.pending_components.contains(name) {
            Some(ComponentState::Pending)
        } else {
            None
        }
    }

    /// Whether nothing is pending and nothing failed.
    pub fn is_finished(&self) -> bool {
        self.pending_components.is_empty() && self.failed_components.is_empty()
    }

    /// Move `name` into `state`, removing it from the other two sets.
    fn move_to(&mut self, name: &str, state: ComponentState) {
        self.completed_components.remove(name);
        self.failed_components.remove(name);
        self.pending_components.remove(name);
        let target = match state {
            ComponentState::Completed => &mut self.completed_components,
            ComponentState::Failed => &mut self.failed_components,
            ComponentState::Pending => &mut self.pending_components,
        };
        target.insert(name.to_string());
    }

    /// Make the tracked set equal `components`: unknown names become pending
    /// and names no longer declared are dropped.
    ///
    /// Returns `(added, dropped)`.
    pub fn reconcile(&mut self, components: &BTreeSet<String>) -> (Vec<String>, Vec<String>) {
        let tracked = self.all_components();
        let added: Vec<String> = components.difference(&tracked).cloned().collect();
        let dropped: Vec<String> = tracked.difference(components).cloned().collect();

        for name in &dropped {
            self.completed_components.remove(name);
            self.failed_components.remove(name);
            self.pending_components.remove(name);
        }
        for name in &added {
            self.pending_components.insert(name.clone());
        }
        (added, dropped)
    }

    /// Check that the three sets are pairwise disjoint.
    pub fn validate(&self) -> Result<()> {
        let overlaps = self
            .completed_components
            .intersection(&self.failed_components)
            .chain(self.completed_components.intersection(&self.pending_components))
            .chain(self.failed_components.intersection(&self.pending_components))
            .cloned()
            .collect::<BTreeSet<_>>();

        if overlaps.is_empty() {
            Ok(())
        } else {
            Err(Error::Checkpoint {
                message: format!(
                    "checkpoint {} lists components in more than one state: {}",
                    self.checkpoint_id,
                    overlaps.into_iter().collect::<Vec<_>>().join(", ")
                ),
            })
        }
    }
}

/// Directory-backed checkpoint persistence.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Path for an id that came from outside the store.
    fn checked_path_for(&self, id: &str) -> Result<PathBuf> {
        if !filesystem::is_plain_name(id) {
            return Err(Error::Checkpoint {
                message: format!("invalid checkpoint id '{}'", id),
            });
        }
        Ok(self.path_for(id))
    }

    fn next_id(&self, created_at: &DateTime<Utc>) -> String {
        let base = format!("checkpoint_{}", created_at.format("%Y%m%d_%H%M%S"));
        if !self.path_for(&base).exists() {
            return base;
        }
        (1u32..)
            .map(|n| format!("{}_{}", base, n))
            .find(|id| !self.path_for(id).exists())
            .unwrap_or(base)
    }

    /// Start tracking a conversion with every component pending.
    pub fn create<I, S>(&self, target_mode: Mode, manifests_dir: &Path, components: I) -> Result<Checkpoint>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fs::create_dir_all(&self.dir)?;
        let created_at = Utc::now();
        let checkpoint = Checkpoint {
            checkpoint_id: self.next_id(&created_at),
            target_mode,
            manifests_dir: manifests_dir.to_path_buf(),
            created_at,
            completed_components: BTreeSet::new(),
            failed_components: BTreeSet::new(),
            pending_components: components.into_iter().map(Into::into).collect(),
        };
        self.save(&checkpoint)?;
        debug!("Created checkpoint {}", checkpoint.checkpoint_id);
        Ok(checkpoint)
    }

    /// Persist `checkpoint`, rejecting records that break the invariant.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        checkpoint.validate()?;
        let json = serde_json::to_vec_pretty(checkpoint)?;
        filesystem::write_atomic(&self.checked_path_for(&checkpoint.checkpoint_id)?, &json)
    }

    /// Load a checkpoint by id.
    pub fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        self.read_file(&self.checked_path_for(id)?)
    }

    fn read_file(&self, path: &Path) -> Result<Option<Checkpoint>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes).map_err(|e| Error::Checkpoint {
            message: format!("malformed checkpoint {}: {}", path.display(), e),
        })?;
        checkpoint.validate()?;
        Ok(Some(checkpoint))
    }

    /// All checkpoints, oldest first.
    pub fn list(&self) -> Result<Vec<Checkpoint>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut checkpoints = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(checkpoint) = self.read_file(&path)? {
                checkpoints.push(checkpoint);
            }
        }

        checkpoints.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.checkpoint_id.cmp(&b.checkpoint_id))
        });
        Ok(checkpoints)
    }

    /// The most recently created checkpoint.
    pub fn load_latest(&self) -> Result<Option<Checkpoint>> {
        Ok(self.list()?.pop())
    }

    /// Record `name` as converted and persist.
    pub fn mark_completed(&self, checkpoint: &mut Checkpoint, name: &str) -> Result<()> {
        checkpoint.move_to(name, ComponentState::Completed);
        self.save(checkpoint)
    }

    /// Record `name` as failed and persist.
    pub fn mark_failed(&self, checkpoint: &mut Checkpoint, name: &str) -> Result<()> {
        checkpoint.move_to(name, ComponentState::Failed);
        self.save(checkpoint)
    }

    /// Move every failed component back to pending and persist.
    pub fn retry_failed(&self, checkpoint: &mut Checkpoint) -> Result<Vec<String>> {
        let failed: Vec<String> = checkpoint.failed_components.iter().cloned().collect();
        for name in &failed {
            checkpoint.move_to(name, ComponentState::Pending);
        }
        self.save(checkpoint)?;
        Ok(failed)
    }

    /// Delete a checkpoint. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        match fs::remove_file(self.checked_path_for(id)?) {
            Ok(()) => {
                debug!("Deleted checkpoint {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
