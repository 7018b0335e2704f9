//! Release version model.
//!
//! A [`ReleaseVersion`] is the bare `major.minor.patch` triple that gets
//! written into charts, manifests, and documentation. Pre-release and build
//! metadata are rejected: every downstream pattern describes three numeric
//! components and nothing else.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The input is not a bare `major.minor.patch` triple.
    #[error("invalid release version {input:?}: expected major.minor.patch")]
    InvalidShape {
        /// The rejected input.
        input: String,
    },

    /// The triple has the right shape but is not valid semver (e.g. leading zeros).
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// A git operation failed.
    #[error("git error: {0}")]
    Git(#[from] crate::git::GitError),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level, ordered from least to most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// A release version: exactly `major.minor.patch`, immutable for one run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseVersion(Version);

impl ReleaseVersion {
    /// Construct from numeric components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse `X.Y.Z` or `vX.Y.Z`.
    pub fn parse(input: &str) -> VersionResult<Self> {
        let trimmed = input.trim();
        Self::parse_triple(trimmed.strip_prefix('v').unwrap_or(trimmed), input)
    }

    /// Version named by `tag`, which must be exactly `prefix` + `X.Y.Z`.
    pub fn from_tag(tag: &str, prefix: &str) -> Option<Self> {
        let bare = tag.strip_prefix(prefix)?;
        Self::parse_triple(bare, tag).ok()
    }

    fn parse_triple(bare: &str, input: &str) -> VersionResult<Self> {
        let mut parts = 0;
        for part in bare.split('.') {
            parts += 1;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::InvalidShape {
                    input: input.to_string(),
                });
            }
        }
        if parts != 3 {
            return Err(VersionError::InvalidShape {
                input: input.to_string(),
            });
        }

        Ok(Self(Version::parse(bare)?))
    }

    /// Major component.
    pub const fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor component.
    pub const fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch component.
    pub const fn patch(&self) -> u64 {
        self.0.patch
    }

    /// `major.minor`, as used in floating image tags.
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.0.major, self.0.minor)
    }

    /// Git tag for this version (e.g. `v1.2.3` with prefix `v`).
    pub fn tag(&self, prefix: &str) -> String {
        format!("{prefix}{self}")
    }

    /// Compute the next version by applying a bump level.
    pub const fn bump(&self, level: BumpLevel) -> Self {
        let v = &self.0;
        match level {
            BumpLevel::Patch => Self::new(v.major, v.minor, v.patch + 1),
            BumpLevel::Minor => Self::new(v.major, v.minor + 1, 0),
            BumpLevel::Major => Self::new(v.major + 1, 0, 0),
        }
    }

    /// Borrow the underlying semver value.
    pub const fn as_semver(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}

impl FromStr for ReleaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ReleaseVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ReleaseVersion> for String {
    fn from(value: ReleaseVersion) -> Self {
        value.to_string()
    }
}

/// Find the latest released version among tags carrying `prefix`.
///
/// Tags that do not parse as a bare triple (e.g. `v2.0.0-rc.1`) are ignored.
/// Returns `None` if no release tag exists yet.
#[instrument(fields(%repo))]
pub fn current_version_from_tags(
    repo: &Utf8Path,
    prefix: &str,
) -> VersionResult<Option<ReleaseVersion>> {
    let tags = crate::git::version_tags(repo, prefix)?;
    let current = tags
        .iter()
        .filter_map(|tag| ReleaseVersion::from_tag(tag, prefix))
        .max();
    debug!(current = ?current.as_ref().map(ToString::to_string), "current version");
    Ok(current)
}
