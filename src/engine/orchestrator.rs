//! Conversion driver.
//!
//! Walks the components in dependency order, converts each one, and records
//! every attempt in the checkpoint before moving on. How a failure affects
//! the rest of the run is decided in one place, [`Transition::next`].

use std::collections::BTreeSet;

use log::{info, warn};

use super::materialize::{MaterializeOptions, MaterializeOutcome, Materializer};
use super::{
    ComponentFailure, ComponentStatus, ConversionObserver, ConversionOptions, ConversionResult, ResumeFrom,
};
use crate::checkpoint::{Checkpoint, CheckpointStore, ComponentState};
use crate::config::{self, Manifest};
use crate::error::{Error, Result};
use crate::ordering;
use crate::workspace::Workspace;

/// What to do with the rest of the run when a component fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Record the failure and carry on with the next component
    Continue,
}

impl FailurePolicy {
    pub fn from_continue_flag(continue_on_error: bool) -> Self {
        if continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        }
    }
}

/// Checkpoint update following one component attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Complete,
    RecordFailureAndContinue,
    RecordFailureAndAbort,
}

impl Transition {
    pub fn next<T>(outcome: &Result<T>, policy: FailurePolicy) -> Self {
        match (outcome, policy) {
            (Ok(_), _) => Transition::Complete,
            (Err(_), FailurePolicy::Continue) => Transition::RecordFailureAndContinue,
            (Err(_), FailurePolicy::Abort) => Transition::RecordFailureAndAbort,
        }
    }
}

pub struct Orchestrator<'a> {
    workspace: &'a Workspace,
    materializer: Materializer<'a>,
    checkpoints: CheckpointStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(workspace: &'a Workspace, materializer: Materializer<'a>) -> Self {
        Self {
            workspace,
            materializer,
            checkpoints: CheckpointStore::new(&workspace.checkpoints_dir),
        }
    }

    /// Create a fresh checkpoint, or load and reconcile the one being resumed.
    /// The checkpoint `resume` points at, as it is on disk.
    pub fn load_resume(&self, resume: &ResumeFrom) -> Result<Checkpoint> {
        let loaded = match &resume.checkpoint_id {
            Some(id) => self.checkpoints.load(id)?,
            None => self.checkpoints.load_latest()?,
        };
        loaded.ok_or_else(|| Error::CheckpointNotFound {
            id: resume.checkpoint_id.clone(),
        })
    }

    pub fn begin(&self, manifest: &Manifest, options: &ConversionOptions) -> Result<Checkpoint> {
        let names: BTreeSet<String> = manifest.components.keys().cloned().collect();

        let Some(resume) = &options.resume else {
            return self
                .checkpoints
                .create(options.target, &self.workspace.manifests_dir, names);
        };

        let mut checkpoint = self.load_resume(resume)?;

        if checkpoint.target_mode != options.target {
            return Err(Error::Checkpoint {
                message: format!(
                    "checkpoint {} converts to {} mode, not {}",
                    checkpoint.checkpoint_id, checkpoint.target_mode, options.target
                ),
            });
        }

        let (added, dropped) = checkpoint.reconcile(&names);
        if !added.is_empty() {
            warn!("Components added since checkpoint: {}", added.join(", "));
        }
        if !dropped.is_empty() {
            warn!("Components no longer in the manifest: {}", dropped.join(", "));
        }
        if options.retry_failed {
            let retried = self.checkpoints.retry_failed(&mut checkpoint)?;
            if !retried.is_empty() {
                info!("Retrying previously failed: {}", retried.join(", "));
            }
        } else {
            self.checkpoints.save(&checkpoint)?;
        }

        info!(
            "Resuming {}: {} completed, {} failed, {} pending",
            checkpoint.checkpoint_id,
            checkpoint.completed_components.len(),
            checkpoint.failed_components.len(),
            checkpoint.pending_components.len()
        );
        Ok(checkpoint)
    }

    /// Convert every pending component of `checkpoint`.
    ///
    /// Returns `Ok` with failures listed when the policy is `Continue`, and
    /// [`Error::ConversionAborted`] at the first failure under `Abort`.
    pub fn run(
        &self,
        manifest: &Manifest,
        checkpoint: &mut Checkpoint,
        options: &ConversionOptions,
        observer: &mut dyn ConversionObserver,
    ) -> Result<ConversionResult> {
        let order = ordering::resolve(manifest)?;
        let target = checkpoint.target_mode;

        if manifest.mode() != target {
            config::set_mode(&self.workspace.manifest_path(), target)?;
        }

        let materialize = MaterializeOptions {
            force: options.force,
            secrets: options.secrets,
            respect_ignore: options.respect_ignore,
        };
        let mut result = ConversionResult::new(target);
        result.checkpoint_id = Some(checkpoint.checkpoint_id.clone());
        observer.conversion_started(order.len());

        for (index, name) in order.iter().enumerate() {
            match checkpoint.state_of(name) {
                Some(ComponentState::Completed) => {
                    result.skipped.push(name.clone());
                    observer.component_finished(name, ComponentStatus::Skipped);
                    continue;
                }
                Some(ComponentState::Failed) => {
                    result.failed.push(ComponentFailure {
                        name: name.clone(),
                        message: "failed in a previous attempt".to_string(),
                    });
                    observer.component_finished(name, ComponentStatus::Failed);
                    continue;
                }
                Some(ComponentState::Pending) | None => {}
            }

            let Some(component) = manifest.component(name) else {
                continue;
            };
            observer.component_started(name, index, order.len());
            info!("Converting {} to {} ({}/{})", name, target, index + 1, order.len());

            let outcome = self
                .materializer
                .convert(component, target, &materialize)
                .map_err(|e| e.for_component(name));

            let transition = Transition::next(&outcome, options.failure_policy);
            match outcome {
                Ok(MaterializeOutcome::Converted { findings }) => {
                    self.checkpoints.mark_completed(checkpoint, name)?;
                    result.successful.push(name.clone());
                    if !findings.is_empty() {
                        result.findings.insert(name.clone(), findings);
                    }
                    observer.component_finished(name, ComponentStatus::Converted);
                }
                Ok(MaterializeOutcome::AlreadyConverted) => {
                    self.checkpoints.mark_completed(checkpoint, name)?;
                    result.skipped.push(name.clone());
                    observer.component_finished(name, ComponentStatus::Skipped);
                }
                Err(error) => {
                    self.checkpoints.mark_failed(checkpoint, name)?;
                    observer.component_finished(name, ComponentStatus::Failed);
                    warn!("{}", error);

                    if transition == Transition::RecordFailureAndAbort {
                        return Err(Error::ConversionAborted {
                            component: name.clone(),
                            checkpoint_id: checkpoint.checkpoint_id.clone(),
                            source: Box::new(error),
                        });
                    }
                    result.failed.push(ComponentFailure {
                        name: name.clone(),
                        message: error.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    /// Delete a checkpoint once its run no longer needs resuming.
    pub fn finish(&self, checkpoint_id: &str) -> Result<()> {
        if self.checkpoints.delete(checkpoint_id)? {
            info!("Removed checkpoint {}", checkpoint_id);
        }
        Ok(())
    }
}
