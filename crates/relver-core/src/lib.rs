//! Core library for relver.
//!
//! This crate provides the foundational types and functionality used by the
//! `relver` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`changelog`] - Prepending release notes to the changelog
//! - [`commits`] - Conventional commit parsing and release level analysis
//! - [`config`] - Configuration loading and management
//! - [`docs`] - Version pattern replacement in markdown docs
//! - [`error`] - Error types and result aliases
//! - [`git`] - Git operations for release workflows
//! - [`notes`] - Release notes rendering
//! - [`preflight`] - Release readiness checks
//! - [`propagate`] - Writing a version into every release asset
//! - [`publish`] - GitHub release creation
//! - [`release`] - The end-to-end release workflow
//! - [`version`] - Release version type and tag lookup
//! - [`yaml`] - Format-preserving YAML scalar edits
//!
//! # Quick Start
//!
//! ```no_run
//! use relver_core::{Config, ConfigLoader, ReleaseVersion};
//! use relver_core::propagate;
//! use camino::Utf8Path;
//!
//! let config = ConfigLoader::new()
//!     .with_project_search(".")
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let version = ReleaseVersion::parse("1.3.0").expect("valid version");
//! let plan = propagate::plan(Utf8Path::new("."), &version, &config, None)
//!     .expect("Failed to plan propagation");
//! plan.apply().expect("Failed to write files");
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod commits;

pub mod config;

pub mod docs;

pub mod error;

pub mod git;

pub mod notes;

pub mod preflight;

pub mod propagate;

pub mod publish;

pub mod release;

pub mod version;

pub mod yaml;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use version::{BumpLevel, ReleaseVersion};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
