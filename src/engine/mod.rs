//! # Conversion Engine
//!
//! Moves every component of a meta-repository between reference and
//! vendored mode as one logical operation.
//!
//! ## Flow
//!
//! 1.  **Pre-flight** ([`crate::preflight`]): nothing is touched unless the
//!     manifest, the tool chain and the dependency graph check out.
//! 2.  **Transaction** ([`transaction`]): an optional backup is taken; if the
//!     conversion fails in atomic mode it is restored.
//! 3.  **Orchestration** ([`orchestrator`]): components are converted one at
//!     a time in dependency order, with progress recorded in a checkpoint
//!     after every attempt.
//! 4.  **Materialization** ([`materialize`]): a single component is fetched
//!     into scratch space, scanned, and swapped into place.
//! 5.  **Verification** ([`verify`]): on success, provenance is compared
//!     with the manifest.
//!
//! The whole run is sequential and single-process. Two invocations against
//! the same workspace are not locked against each other and must not be
//! started concurrently.

pub mod materialize;
pub mod orchestrator;
pub mod transaction;
pub mod verify;

use std::collections::BTreeMap;
use std::fmt;

use log::{info, warn};
use serde::Serialize;

use crate::backup::BackupStore;
use crate::checkpoint::{CheckpointStore, ComponentState};
use crate::config::{self, Manifest, Mode};
use crate::error::{Error, Result};
use crate::fetch::FetchLayer;
use crate::git;
use crate::ordering;
use crate::preflight::{ValidationReport, Validator};
use crate::provenance::Provenance;
use crate::secrets::{Finding, SecretPolicy, SecretScanner};
use crate::workspace::Workspace;

use materialize::Materializer;
use orchestrator::{FailurePolicy, Orchestrator};
use transaction::{Transaction, TransactionOptions, TransactionOutcome};
use verify::VerificationIssue;

/// Which checkpoint to continue from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeFrom {
    /// `None` picks the most recent checkpoint
    pub checkpoint_id: Option<String>,
}

/// Everything that shapes one conversion run.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub target: Mode,
    pub force: bool,
    pub failure_policy: FailurePolicy,
    pub secrets: SecretPolicy,
    pub respect_ignore: bool,
    pub atomic: bool,
    pub create_backup: bool,
    pub verify: bool,
    pub resume: Option<ResumeFrom>,
    pub retry_failed: bool,
}

impl ConversionOptions {
    /// Defaults used by `metarepo convert`: scan, back up, roll back on
    /// failure, and verify.
    pub fn new(target: Mode) -> Self {
        Self {
            target,
            force: false,
            failure_policy: FailurePolicy::Abort,
            secrets: SecretPolicy::Warn,
            respect_ignore: false,
            atomic: true,
            create_backup: true,
            verify: true,
            resume: None,
            retry_failed: false,
        }
    }
}

/// A component that did not convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentFailure {
    pub name: String,
    pub message: String,
}

/// Summary of one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    pub target: Mode,
    pub successful: Vec<String>,
    pub failed: Vec<ComponentFailure>,
    pub skipped: Vec<String>,
    /// Secret findings accepted under a warn-only policy, by component
    pub findings: BTreeMap<String, Vec<Finding>>,
    pub verification: Vec<VerificationIssue>,
    /// Checkpoint to resume from; `None` once the run needs no resuming
    pub checkpoint_id: Option<String>,
    /// Snapshot taken before the run, if any
    pub backup: Option<String>,
}

impl ConversionResult {
    pub fn new(target: Mode) -> Self {
        Self {
            target,
            successful: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            findings: BTreeMap::new(),
            verification: Vec::new(),
            checkpoint_id: None,
            backup: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn finding_count(&self) -> usize {
        self.findings.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Converted,
    Skipped,
    Failed,
}

/// Progress callbacks; every method defaults to doing nothing.
pub trait ConversionObserver {
    fn conversion_started(&mut self, _total: usize) {}
    fn component_started(&mut self, _name: &str, _index: usize, _total: usize) {}
    fn component_finished(&mut self, _name: &str, _status: ComponentStatus) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Planned action for one component in a dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "reason")]
pub enum PlannedAction {
    Materialize,
    Reconstitute,
    Skip(String),
    /// The component would fail
    Blocked(String),
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedAction::Materialize => f.write_str("vendor"),
            PlannedAction::Reconstitute => f.write_str("reconstitute"),
            PlannedAction::Skip(reason) => write!(f, "skip ({})", reason),
            PlannedAction::Blocked(reason) => write!(f, "blocked ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub name: String,
    pub action: PlannedAction,
}

/// What a conversion would do, computed without touching anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionPlan {
    pub target: Mode,
    pub current: Mode,
    pub steps: Vec<PlannedStep>,
    pub validation: ValidationReport,
}

/// Entry point for conversions against one workspace.
pub struct Engine {
    workspace: Workspace,
    fetch: FetchLayer,
    scanner: SecretScanner,
}

impl Engine {
    pub fn new(workspace: Workspace, fetch: FetchLayer) -> Result<Self> {
        Ok(Self {
            workspace,
            fetch,
            scanner: SecretScanner::new()?,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn checkpoints(&self) -> CheckpointStore {
        CheckpointStore::new(&self.workspace.checkpoints_dir)
    }

    pub fn backups(&self) -> BackupStore {
        BackupStore::new(&self.workspace)
    }

    /// Run pre-flight checks without converting.
    pub fn validate(&self, secrets: SecretPolicy) -> (ValidationReport, Option<Manifest>) {
        Validator::new(&self.workspace, self.fetch.git())
            .with_secret_policy(secrets)
            .run()
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        let materializer = Materializer::new(&self.workspace, &self.fetch, &self.scanner);
        Orchestrator::new(&self.workspace, materializer)
    }

    /// Compute what [`Engine::convert`] would do.
    pub fn plan(&self, options: &ConversionOptions) -> Result<ConversionPlan> {
        let (validation, manifest) = self.validate(SecretPolicy::Skip);
        let Some(manifest) = manifest else {
            return Err(Error::Validation {
                errors: validation.errors,
            });
        };

        let checkpoint = match &options.resume {
            Some(resume) => Some(self.orchestrator().load_resume(resume)?),
            None => None,
        };

        let order = if validation.valid {
            ordering::resolve(&manifest)?
        } else {
            manifest.names().map(str::to_string).collect()
        };

        let mut steps = Vec::with_capacity(order.len());
        for name in order {
            let state = checkpoint.as_ref().and_then(|cp| cp.state_of(&name));
            let action = match state {
                Some(ComponentState::Completed) => PlannedAction::Skip("completed in checkpoint".to_string()),
                Some(ComponentState::Failed) if !options.retry_failed => {
                    PlannedAction::Skip("failed in checkpoint; use --retry-failed".to_string())
                }
                _ => self.plan_component(&manifest, &name, options)?,
            };
            steps.push(PlannedStep { name, action });
        }

        Ok(ConversionPlan {
            target: options.target,
            current: manifest.mode(),
            steps,
            validation,
        })
    }

    fn plan_component(&self, manifest: &Manifest, name: &str, options: &ConversionOptions) -> Result<PlannedAction> {
        let dir = self.workspace.component_dir(name);
        let record = Provenance::read(&dir)?;
        Ok(match options.target {
            Mode::Vendored => match (record, manifest.component(name)) {
                (Some(record), Some(component)) if record.matches(component) && !options.force => {
                    PlannedAction::Skip(format!("already vendored at {}", record.version))
                }
                _ => PlannedAction::Materialize,
            },
            Mode::Reference => match record {
                Some(_) => PlannedAction::Reconstitute,
                None if git::is_checkout(&dir) => PlannedAction::Skip("already a live checkout".to_string()),
                None => PlannedAction::Blocked("no provenance record".to_string()),
            },
        })
    }

    /// Convert the whole workspace to `options.target`.
    ///
    /// Returns `Ok` for full and partial success; inspect
    /// [`ConversionResult::is_success`]. A rolled-back run is
    /// [`Error::RolledBack`]. A checkpoint created by the run is removed,
    /// since the restored tree no longer matches the recorded progress; a
    /// resumed checkpoint is put back as it was loaded.
    pub fn convert(
        &self,
        options: &ConversionOptions,
        observer: &mut dyn ConversionObserver,
    ) -> Result<ConversionResult> {
        self.workspace.ensure_state_dirs()?;

        let (report, manifest) = self.validate(SecretPolicy::Skip);
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        let report = report.into_result()?;
        let Some(manifest) = manifest else {
            return Err(Error::Validation {
                errors: report.errors,
            });
        };

        let orchestrator = self.orchestrator();
        let backups = self.backups();
        let transaction = Transaction::new(
            &backups,
            TransactionOptions {
                create_backup: options.create_backup,
                atomic: options.atomic,
                include_components: true,
            },
        );

        let resumed_from = match &options.resume {
            Some(resume) => Some(orchestrator.load_resume(resume)?),
            None => None,
        };

        let mut active: Option<String> = None;
        let outcome = transaction.run(|| {
            let mut checkpoint = orchestrator.begin(&manifest, options)?;
            active = Some(checkpoint.checkpoint_id.clone());
            orchestrator.run(&manifest, &mut checkpoint, options, observer)
        })?;

        let mut result = match outcome {
            TransactionOutcome::Committed { value, backup } => ConversionResult { backup, ..value },
            TransactionOutcome::RolledBack { error, backup } => {
                match (&resumed_from, &active) {
                    (Some(original), _) => {
                        self.checkpoints().save(original)?;
                        info!("Restored checkpoint {}", original.checkpoint_id);
                    }
                    (None, Some(id)) => orchestrator.finish(id)?,
                    (None, None) => {}
                }
                return Err(Error::RolledBack {
                    backup,
                    source: Box::new(error),
                });
            }
        };

        if result.is_success() {
            if options.verify {
                match config::from_file(&self.workspace.manifest_path()) {
                    Ok(manifest) => {
                        result.verification = verify::verify(&self.workspace, &manifest, result.target);
                    }
                    Err(e) => warn!("Skipping verification: {}", e),
                }
                for issue in &result.verification {
                    warn!("Verification: {}", issue);
                }
            }
            if let Some(id) = result.checkpoint_id.take() {
                orchestrator.finish(&id)?;
            }
            info!(
                "Converted {} component(s) to {} ({} skipped)",
                result.successful.len(),
                result.target,
                result.skipped.len()
            );
        } else {
            warn!(
                "{} component(s) failed; resume with checkpoint {}",
                result.failed.len(),
                result.checkpoint_id.as_deref().unwrap_or("?")
            );
        }

        Ok(result)
    }

    /// Check the workspace against the mode its manifest declares.
    pub fn verify(&self) -> Result<Vec<VerificationIssue>> {
        let manifest = config::from_file(&self.workspace.manifest_path())?;
        Ok(verify::verify(&self.workspace, &manifest, manifest.mode()))
    }
}
