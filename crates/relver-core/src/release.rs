//! Release orchestrator: the full release workflow.
//!
//! Phases run strictly in order and any failure stops the ones after it:
//!
//! `verify` → `analyze` → `notes` → `prepare` → `commit` → `tag` → `push` → `publish`
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_release`]) runs preflight checks, resolves the version
//!    (explicit, or from commits since the last tag), renders the notes, and
//!    computes every file edit in memory.
//! 2. **Execute** ([`ReadyRelease::execute`]) writes the files, commits, tags,
//!    pushes, and publishes, reporting progress through event callbacks.
//!
//! Because all edits are computed during planning, a missing README or a
//! malformed chart aborts the release before anything is written or committed.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::commits;
use crate::config::Config;
use crate::git;
use crate::notes::{self, NotesContext};
use crate::preflight;
use crate::propagate::{self, FileOutcome, PropagationPlan};
use crate::publish::{self, ReleaseRequest};
use crate::version::{self, BumpLevel, ReleaseVersion};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Preflight checks failed.
    #[error("preflight checks failed: {0}")]
    PreflightFailed(String),

    /// The release tag already exists.
    #[error("tag {tag} already exists")]
    TagExists {
        /// The conflicting tag.
        tag: String,
    },

    /// Version error.
    #[error(transparent)]
    Version(#[from] crate::version::VersionError),

    /// Git error.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// File propagation error.
    #[error(transparent)]
    Propagate(#[from] crate::propagate::PropagateError),

    /// Publication error.
    #[error(transparent)]
    Publish(#[from] crate::publish::PublishError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Options controlling which phases run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Release this version instead of analyzing commits.
    pub explicit_version: Option<String>,
    /// Compute everything, write nothing.
    pub dry_run: bool,
    /// Commit and tag locally without pushing.
    pub no_push: bool,
    /// Skip the GitHub release.
    pub no_publish: bool,
}

// ──────────────────────────────────────────────
// Phases and events
// ──────────────────────────────────────────────

/// Phases of the release workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    /// Validate release readiness.
    Verify,
    /// Determine the next version.
    Analyze,
    /// Render release notes.
    Notes,
    /// Write the version into charts, manifests, docs, and the changelog.
    Prepare,
    /// Commit the release assets.
    Commit,
    /// Create the release tag.
    Tag,
    /// Push the branch and tag.
    Push,
    /// Create the GitHub release.
    Publish,
}

impl std::fmt::Display for ReleasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Verify => "verify",
            Self::Analyze => "analyze",
            Self::Notes => "notes",
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::Tag => "tag",
            Self::Push => "push",
            Self::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Events emitted during execution for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A phase has started.
    PhaseStarted(ReleasePhase),
    /// A phase has completed.
    PhaseCompleted(ReleasePhase, PhaseOutcome),
}

/// Outcome of a single phase.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PhaseOutcome {
    /// Phase completed successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// Phase was skipped.
    Skipped {
        /// Why the phase was skipped.
        reason: String,
    },
}

impl PhaseOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Outcome of the full release workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// The released version.
    pub version: ReleaseVersion,
    /// The previous release, if any.
    pub previous_version: Option<ReleaseVersion>,
    /// The release tag.
    pub tag: String,
    /// Results of each phase.
    pub phases: Vec<(ReleasePhase, PhaseOutcome)>,
    /// Hash of the release commit.
    pub commit_hash: Option<String>,
    /// URL of the GitHub release.
    pub release_url: Option<String>,
    /// Per-file propagation results.
    pub files: Vec<FileOutcome>,
    /// Release notes.
    pub notes: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

// ──────────────────────────────────────────────
// Resolution
// ──────────────────────────────────────────────

/// How the version was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source", content = "level")]
pub enum VersionSource {
    /// Given on the command line.
    Explicit,
    /// Computed from commits.
    Commits(BumpLevel),
    /// First release computed from commits.
    Initial,
}

/// Version, tags, and notes for the next release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseInfo {
    /// The version to release.
    pub version: ReleaseVersion,
    /// The previous release, if any.
    pub previous: Option<ReleaseVersion>,
    /// Tag for `version`.
    pub tag: String,
    /// Tag of `previous`.
    pub previous_tag: Option<String>,
    /// How the version was chosen.
    pub source: VersionSource,
    /// Number of commits since the previous release.
    pub commit_count: usize,
    /// Rendered release notes.
    pub notes: String,
}

/// Resolve the next release, or `None` when no commit is release-worthy.
#[instrument(skip(config), fields(%root))]
pub fn resolve_release(
    root: &Utf8Path,
    config: &Config,
    explicit_version: Option<&str>,
) -> ReleaseResult<Option<ReleaseInfo>> {
    let prefix = config.release.tag_prefix.as_str();
    let previous = version::current_version_from_tags(root, prefix)?;
    let previous_tag = previous.as_ref().map(|v| v.tag(prefix));

    let records = git::commits_since(root, previous_tag.as_deref())?;
    let analyzed = commits::analyze(&records);

    let (version, source) = match explicit_version {
        Some(raw) => (ReleaseVersion::parse(raw)?, VersionSource::Explicit),
        None => {
            let Some(next) = commits::next_version(previous.as_ref(), &analyzed) else {
                info!(commits = records.len(), "no release-worthy commits");
                return Ok(None);
            };
            let source = match (previous.is_some(), commits::release_level(&analyzed)) {
                (true, Some(level)) => VersionSource::Commits(level),
                _ => VersionSource::Initial,
            };
            (next, source)
        }
    };

    if let Some(ref prev) = previous
        && version <= *prev
    {
        warn!(%version, previous = %prev, "release version is not newer than the latest tag");
    }

    let tag = version.tag(prefix);
    let repo_url = git::remote_url(root, &config.release.remote)?
        .as_deref()
        .and_then(git::web_url);
    let date = notes::iso_date_today();
    let notes = notes::render_notes(
        &NotesContext {
            version: &version,
            tag: &tag,
            previous_tag: previous_tag.as_deref(),
            repo_url: repo_url.as_deref(),
            date: &date,
        },
        &analyzed,
    );

    debug!(%version, ?source, commits = records.len(), "release resolved");
    Ok(Some(ReleaseInfo {
        version,
        previous,
        tag,
        previous_tag,
        source,
        commit_count: records.len(),
        notes,
    }))
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// The result of planning a release.
#[derive(Debug)]
pub enum ReleasePlan {
    /// Everything computed, ready to execute.
    Ready(Box<ReadyRelease>),
    /// No commit since the last release warrants a new one.
    NothingToRelease {
        /// The latest release, if any.
        previous: Option<ReleaseVersion>,
    },
}

/// A release plan that is ready to execute.
#[derive(Debug)]
pub struct ReadyRelease {
    /// Repository root.
    pub root: Utf8PathBuf,
    /// Loaded configuration.
    pub config: Config,
    /// Workflow options.
    pub options: ReleaseOptions,
    /// Resolved version and notes.
    pub info: ReleaseInfo,
    /// Computed file edits.
    pub propagation: PropagationPlan,
}

/// Plan the release: verify, analyze, render notes, and compute file edits.
#[instrument(skip(config, options), fields(%root, dry_run = options.dry_run))]
pub fn plan_release(
    root: &Utf8Path,
    config: &Config,
    options: ReleaseOptions,
) -> ReleaseResult<ReleasePlan> {
    let needs_gh = config.release.github_release && !options.no_publish && !options.dry_run;
    let report = preflight::run_preflight(root, config, needs_gh);
    if !report.all_passed {
        return Err(ReleaseError::PreflightFailed(report.failures().join("; ")));
    }

    let Some(info) = resolve_release(root, config, options.explicit_version.as_deref())? else {
        let previous = version::current_version_from_tags(root, &config.release.tag_prefix)?;
        return Ok(ReleasePlan::NothingToRelease { previous });
    };

    if git::version_tags(root, &config.release.tag_prefix)?.contains(&info.tag) {
        return Err(ReleaseError::TagExists { tag: info.tag });
    }

    let propagation = propagate::plan(root, &info.version, config, Some(&info.notes))?;

    Ok(ReleasePlan::Ready(Box::new(ReadyRelease {
        root: root.to_path_buf(),
        config: config.clone(),
        options,
        info,
        propagation,
    })))
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Records a phase and notifies the listener.
struct PhaseLog<F: FnMut(ReleaseEvent)> {
    phases: Vec<(ReleasePhase, PhaseOutcome)>,
    on_event: F,
}

impl<F: FnMut(ReleaseEvent)> PhaseLog<F> {
    fn start(&mut self, phase: ReleasePhase) {
        debug!(%phase, "phase started");
        (self.on_event)(ReleaseEvent::PhaseStarted(phase));
    }

    fn complete(&mut self, phase: ReleasePhase, outcome: PhaseOutcome) {
        match &outcome {
            PhaseOutcome::Success { message } => info!(%phase, %message, "phase completed"),
            PhaseOutcome::Skipped { reason } => info!(%phase, %reason, "phase skipped"),
        }
        (self.on_event)(ReleaseEvent::PhaseCompleted(phase, outcome.clone()));
        self.phases.push((phase, outcome));
    }

    /// Start and complete a phase whose work happened during planning.
    fn record(&mut self, phase: ReleasePhase, outcome: PhaseOutcome) {
        self.start(phase);
        self.complete(phase, outcome);
    }
}

impl ReadyRelease {
    /// Execute the release.
    ///
    /// Calls `on_event` at phase boundaries so the CLI can update
    /// progress display.
    #[instrument(skip(self, on_event), fields(
        version = %self.info.version,
        tag = %self.info.tag,
        dry_run = self.options.dry_run
    ))]
    pub fn execute(self, on_event: impl FnMut(ReleaseEvent)) -> ReleaseResult<ReleaseOutcome> {
        let Self {
            root,
            config,
            options,
            info,
            propagation,
        } = self;
        let is_dry = options.dry_run;
        let tag = info.tag.clone();
        let mut log = PhaseLog {
            phases: Vec::new(),
            on_event,
        };

        // ── Verify, analyze, notes (done while planning) ──
        log.record(
            ReleasePhase::Verify,
            PhaseOutcome::success("All preflight checks passed"),
        );
        let from = info
            .previous
            .as_ref()
            .map_or_else(|| "first release".to_string(), ToString::to_string);
        let how = match info.source {
            VersionSource::Explicit => "explicit".to_string(),
            VersionSource::Commits(level) => level.to_string(),
            VersionSource::Initial => "initial".to_string(),
        };
        log.record(
            ReleasePhase::Analyze,
            PhaseOutcome::success(format!("{from} → {} ({how})", info.version)),
        );
        log.record(
            ReleasePhase::Notes,
            PhaseOutcome::success(format!(
                "{} commit(s) since {}",
                info.commit_count,
                info.previous_tag.as_deref().unwrap_or("the beginning")
            )),
        );

        // ── Prepare ──
        log.start(ReleasePhase::Prepare);
        let assets: Vec<String> = propagation
            .asset_paths()
            .iter()
            .map(ToString::to_string)
            .collect();
        let has_changes = propagation.has_changes();
        let files = if is_dry {
            propagation.preview()
        } else {
            propagation.apply()?
        };
        let updated = files.updated_paths();
        let summary = if updated.is_empty() {
            "No file changes".to_string()
        } else {
            updated
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        log.complete(
            ReleasePhase::Prepare,
            PhaseOutcome::success(if is_dry {
                format!("Would update: {summary}")
            } else {
                format!("Updated: {summary}")
            }),
        );

        // ── Commit ──
        log.start(ReleasePhase::Commit);
        let message = config.release.render_commit_message(
            &info.version.to_string(),
            &tag,
            &info.notes,
        );
        let mut commit_hash = None;
        let outcome = if !has_changes {
            PhaseOutcome::skipped("No file changes to commit")
        } else if is_dry {
            PhaseOutcome::success(format!("Would commit {} file(s)", assets.len()))
        } else {
            let paths: Vec<&str> = assets.iter().map(String::as_str).collect();
            git::add(&root, &paths)?;
            let hash = git::commit(&root, &message)?;
            let short = hash.get(..7).unwrap_or(&hash).to_string();
            commit_hash = Some(hash);
            PhaseOutcome::success(format!("Committed {short}"))
        };
        log.complete(ReleasePhase::Commit, outcome);

        // ── Tag ──
        log.start(ReleasePhase::Tag);
        let outcome = if is_dry {
            PhaseOutcome::success(format!("Would tag {tag}"))
        } else {
            git::create_tag(&root, &tag, &format!("Release {tag}"))?;
            PhaseOutcome::success(format!("Tagged {tag}"))
        };
        log.complete(ReleasePhase::Tag, outcome);

        // ── Push ──
        log.start(ReleasePhase::Push);
        let remote = config.release.remote.as_str();
        let outcome = if options.no_push {
            PhaseOutcome::skipped("--no-push flag")
        } else {
            let branch = git::current_branch(&root)?.unwrap_or_else(|| "HEAD".into());
            if is_dry {
                PhaseOutcome::success(format!("Would push {branch} and {tag} to {remote}"))
            } else {
                git::push(&root, remote, &branch)?;
                PhaseOutcome::success(format!("Pushed {branch} and {tag} to {remote}"))
            }
        };
        log.complete(ReleasePhase::Push, outcome);

        // ── Publish ──
        log.start(ReleasePhase::Publish);
        let mut release_url = None;
        let outcome = if options.no_publish {
            PhaseOutcome::skipped("--no-publish flag")
        } else if !config.release.github_release {
            PhaseOutcome::skipped("github_release = false in config")
        } else if options.no_push {
            PhaseOutcome::skipped("tag was not pushed")
        } else if is_dry {
            PhaseOutcome::success(format!("Would create GitHub release {tag}"))
        } else {
            release_url = publish::create_release(
                &root,
                &ReleaseRequest {
                    tag: &tag,
                    notes: &info.notes,
                    draft: config.release.draft,
                },
            )?;
            PhaseOutcome::success(release_url.as_ref().map_or_else(
                || format!("Created GitHub release {tag}"),
                |url| format!("Created GitHub release: {url}"),
            ))
        };
        log.complete(ReleasePhase::Publish, outcome);

        let outcome = ReleaseOutcome {
            version: info.version,
            previous_version: info.previous,
            tag,
            phases: log.phases,
            commit_hash,
            release_url,
            files: files.files,
            notes: info.notes,
            dry_run: is_dry,
        };

        info!(
            version = %outcome.version,
            tag = %outcome.tag,
            dry_run = outcome.dry_run,
            "release complete"
        );

        Ok(outcome)
    }
}
