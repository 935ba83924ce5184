//! # Fetch Layer
//!
//! Wraps [`GitOperations::checkout`] with a bounded retry loop. Transient
//! failures ([`Error::is_transient`]) are retried with exponential backoff;
//! anything else is returned immediately. Once the attempt budget is spent
//! the caller gets [`Error::FetchExhausted`], which the orchestrator records
//! as a component failure.

use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::repository::{DefaultGitOperations, GitOperations};

/// Retry behavior for fetch operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after every retry
    pub multiplier: u32,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Retrying wrapper around remote source acquisition.
pub struct FetchLayer {
    git: Box<dyn GitOperations>,
    policy: RetryPolicy,
    sleep: Sleeper,
}

impl FetchLayer {
    /// Fetch layer over the system `git` with the default retry policy.
    pub fn system() -> Self {
        Self::new(Box::new(DefaultGitOperations), RetryPolicy::default())
    }

    pub fn new(git: Box<dyn GitOperations>, policy: RetryPolicy) -> Self {
        Self {
            git,
            policy,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The underlying git operations, for tool checks.
    pub fn git(&self) -> &dyn GitOperations {
        self.git.as_ref()
    }

    /// Check out `url` at `version` into `target_dir`, retrying transient
    /// failures.
    pub fn fetch(&self, url: &str, version: &str, target_dir: &Path) -> Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Fetching {}@{} (attempt {}/{})", url, version, attempt, max_attempts);

            match self.git.checkout(url, version, target_dir) {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(Error::FetchExhausted {
                            url: url.to_string(),
                            r#ref: version.to_string(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "Fetch attempt {} for {}@{} failed: {}, retrying in {:?}",
                        attempt, url, version, e, delay
                    );
                    (self.sleep)(delay);
                }
            }
        }
    }
}
