//! # metarepo
//!
//! Library behind the `metarepo` command-line tool. A meta-repository
//! aggregates many independently versioned component repositories, either
//! as live pinned checkouts (**reference** mode) or as immutable copies
//! inside the meta-repository (**vendored** mode). This crate converts the
//! whole fleet between the two.
//!
//! ## Quick Example
//!
//! ```
//! use metarepo::config::{self, Mode};
//! use metarepo::ordering;
//!
//! let manifest = config::parse(r#"
//! meta:
//!   mode: reference
//! components:
//!   api:
//!     repo: https://github.com/example/api.git
//!     version: v0.4.1
//!     depends_on: [core]
//!   core:
//!     repo: https://github.com/example/core.git
//!     version: v1.2.0
//! "#).unwrap();
//!
//! assert_eq!(manifest.mode(), Mode::Reference);
//! assert_eq!(ordering::resolve(&manifest).unwrap(), vec!["core", "api"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifest (`config`)**: `manifests/metarepo.yaml`, the declared
//!   components and the current mode.
//! - **Workspace (`workspace`)**: every directory root the engine touches.
//! - **Engine (`engine`)**: pre-flight, backup, ordered per-component
//!   conversion with checkpoints, rollback, and verification.
//! - **Fetching (`fetch`, `repository`, `git`)**: the retrying layer over
//!   git checkouts and the trait that lets tests replace git.
//! - **Safety (`secrets`, `preflight`)**: credential scanning and read-only
//!   validation.
//! - **State (`checkpoint`, `backup`, `provenance`)**: the on-disk records
//!   that make conversions resumable and reversible.

pub mod backup;
pub mod checkpoint;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod filesystem;
pub mod git;
pub mod ordering;
pub mod output;
pub mod preflight;
pub mod provenance;
pub mod repository;
pub mod secrets;
pub mod suggestions;
pub mod workspace;

#[cfg(test)]
mod ordering_proptest;
