//! Backup-guarded execution of a conversion.
//!
//! [`Transaction::run`] optionally snapshots the workspace, runs the
//! conversion, and restores the snapshot if the conversion returns an error
//! and atomic mode is on.

use log::{info, warn};

use crate::backup::{BackupHandle, BackupStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct TransactionOptions {
    /// Snapshot before running
    pub create_backup: bool,
    /// Restore the snapshot when the body fails
    pub atomic: bool,
    /// Include the components directory in the snapshot
    pub include_components: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            atomic: true,
            include_components: true,
        }
    }
}

/// How a transaction ended when it did not return an error.
#[derive(Debug)]
pub enum TransactionOutcome<T> {
    /// The body succeeded. The snapshot, if any, is kept.
    Committed { value: T, backup: Option<String> },
    /// The body failed and the workspace was restored from `backup`.
    RolledBack { error: Error, backup: String },
}

pub struct Transaction<'a> {
    store: &'a BackupStore,
    options: TransactionOptions,
}

impl<'a> Transaction<'a> {
    pub fn new(store: &'a BackupStore, options: TransactionOptions) -> Self {
        Self { store, options }
    }

    /// Run `body` under the configured backup and rollback policy.
    ///
    /// Errors from `body` are returned as-is unless they were rolled back.
    /// A failed backup prevents `body` from running. A failed restore is a
    /// [`Error::Restore`] naming both failures.
    pub fn run<T, F>(&self, body: F) -> Result<TransactionOutcome<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let backup = if self.options.create_backup {
            Some(self.snapshot()?)
        } else {
            None
        };

        let error = match body() {
            Ok(value) => {
                return Ok(TransactionOutcome::Committed {
                    value,
                    backup: backup.map(|b| b.metadata.backup_name),
                })
            }
            Err(e) => e,
        };

        if !self.options.atomic {
            return Err(error);
        }

        let Some(backup) = backup else {
            warn!("Atomic mode requested without a backup; changes cannot be rolled back");
            return Err(error);
        };

        warn!("Conversion failed, restoring backup {}", backup.name());
        match self
            .store
            .restore_handle(&backup, backup.metadata.includes_components)
        {
            Ok(()) => {
                info!("Rolled back to backup {}", backup.name());
                Ok(TransactionOutcome::RolledBack {
                    error,
                    backup: backup.metadata.backup_name,
                })
            }
            Err(restore_error) => Err(Error::Restore {
                name: backup.metadata.backup_name.clone(),
                message: format!("{} (while rolling back after: {})", restore_error, error),
            }),
        }
    }

    fn snapshot(&self) -> Result<BackupHandle> {
        self.store
            .create(None, self.options.include_components)
            .map_err(|e| match e {
                Error::Backup { .. } => e,
                other => Error::Backup {
                    message: other.to_string(),
                },
            })
    }
}
