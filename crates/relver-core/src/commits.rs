//! Conventional commit analysis.
//!
//! Determines whether the commits since the last release warrant a new
//! release and at which [`BumpLevel`], following the angular convention:
//! breaking changes bump major, `feat` bumps minor, `fix` and `perf` bump
//! patch, and everything else is not release-worthy on its own.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::git::CommitRecord;
use crate::version::{BumpLevel, ReleaseVersion};

/// Markers that exclude a commit from analysis.
const SKIP_MARKERS: &[&str] = &["[skip release]", "[release skip]"];

static HEADER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(?<type>[A-Za-z]+)(?:\((?<scope>[^()]*)\))?(?<bang>!)?: (?<subject>.+)$").ok()
});

static BREAKING_FOOTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^BREAKING[ -]CHANGES?:\s*").ok());

/// A parsed conventional commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConventionalCommit {
    /// Full commit hash.
    pub hash: String,
    /// Commit type (`feat`, `fix`, ...), lowercased.
    pub kind: String,
    /// Optional scope from `type(scope):`.
    pub scope: Option<String>,
    /// Subject line after the colon.
    pub subject: String,
    /// Breaking change notes; non-empty `!` headers get the subject.
    pub breaking: Vec<String>,
}

impl ConventionalCommit {
    /// Parse a commit message. Returns `None` for non-conventional headers.
    pub fn parse(hash: &str, message: &str) -> Option<Self> {
        let header_re = HEADER.as_ref()?;
        let mut lines = message.trim_start().lines();
        let header = lines.next()?.trim_end();
        let caps = header_re.captures(header)?;

        let subject = caps["subject"].trim().to_string();
        let mut breaking = Vec::new();

        if let Some(footer_re) = BREAKING_FOOTER.as_ref()
            && let Some(m) = footer_re.find(message)
        {
            let note = message[m.end()..].trim();
            if !note.is_empty() {
                breaking.push(note.to_string());
            }
        }
        if breaking.is_empty() && caps.name("bang").is_some() {
            breaking.push(subject.clone());
        }

        Some(Self {
            hash: hash.to_string(),
            kind: caps["type"].to_ascii_lowercase(),
            scope: caps
                .name("scope")
                .map(|s| s.as_str().trim().to_string())
                .filter(|s| !s.is_empty()),
            subject,
            breaking,
        })
    }

    /// Whether this commit carries a breaking change.
    pub fn is_breaking(&self) -> bool {
        !self.breaking.is_empty()
    }

    /// The bump level this commit alone asks for.
    pub fn level(&self) -> Option<BumpLevel> {
        if self.is_breaking() {
            return Some(BumpLevel::Major);
        }
        match self.kind.as_str() {
            "feat" => Some(BumpLevel::Minor),
            "fix" | "perf" => Some(BumpLevel::Patch),
            _ => None,
        }
    }

    /// First seven characters of the hash.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Parse raw commits, dropping skipped and non-conventional ones.
#[instrument(skip_all, fields(count = records.len()))]
pub fn analyze(records: &[CommitRecord]) -> Vec<ConventionalCommit> {
    let parsed: Vec<ConventionalCommit> = records
        .iter()
        .filter(|r| !SKIP_MARKERS.iter().any(|m| r.message.contains(m)))
        .filter_map(|r| ConventionalCommit::parse(&r.hash, &r.message))
        .collect();
    debug!(conventional = parsed.len(), "commits analyzed");
    parsed
}

/// The highest bump level requested by any commit.
pub fn release_level(commits: &[ConventionalCommit]) -> Option<BumpLevel> {
    commits.iter().filter_map(ConventionalCommit::level).max()
}

/// Next version given the previous release and the analyzed commits.
///
/// The first release is always `1.0.0`. Returns `None` when no commit is
/// release-worthy.
pub fn next_version(
    previous: Option<&ReleaseVersion>,
    commits: &[ConventionalCommit],
) -> Option<ReleaseVersion> {
    let level = release_level(commits)?;
    Some(match previous {
        Some(prev) => prev.bump(level),
        None => ReleaseVersion::new(1, 0, 0),
    })
}
