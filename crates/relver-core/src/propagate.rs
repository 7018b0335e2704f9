//! Release version propagation.
//!
//! Writes one [`ReleaseVersion`] into every place the repository records it:
//! the Helm chart and values descriptors, the Flux chart reference, the
//! README, and (for full releases) the changelog.
//!
//! Propagation is two-phase. [`plan`] reads every target and computes all new
//! contents in memory; any problem (missing README, malformed YAML, README
//! without version patterns) surfaces here, before a single byte is written.
//! [`PropagationPlan::apply`] then writes the changed files, each one
//! atomically through a temporary file in the same directory.

use std::fs;
use std::io::{self, Write as _};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::changelog;
use crate::config::Config;
use crate::docs::{self, DocRules, DocsError, RuleMatch};
use crate::version::ReleaseVersion;
use crate::yaml::{self, YamlError};

/// Errors from planning or applying a propagation.
#[derive(Error, Debug)]
pub enum PropagateError {
    /// The documentation file does not exist.
    #[error("required file not found: {path}")]
    MissingRequiredFile {
        /// Path relative to the repository root.
        path: Utf8PathBuf,
    },

    /// A target could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// A structured target could not be edited.
    #[error("failed to update {path}: {source}")]
    Yaml {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The YAML edit error.
        source: YamlError,
    },

    /// The documentation rules could not be applied.
    #[error("failed to update {path}: {source}")]
    Docs {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The substitution error.
        source: DocsError,
    },

    /// A target could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Path of the file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
}

/// Result alias for propagation.
pub type PropagateResult<T> = Result<T, PropagateError>;

/// What a target file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Helm chart descriptor.
    HelmChart,
    /// Helm values descriptor.
    HelmValues,
    /// Flux chart reference.
    FluxChart,
    /// Documentation file.
    Docs,
    /// Changelog.
    Changelog,
}

impl TargetKind {
    /// Fields written into structured targets, as dotted paths.
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::HelmChart => &["version", "appVersion"],
            Self::HelmValues => &["image.tag"],
            Self::FluxChart => &["spec.ref.tag"],
            Self::Docs | Self::Changelog => &[],
        }
    }
}

/// Where a target stands after planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// New contents differ from the file on disk.
    Updated,
    /// The file already carries this version.
    Unchanged,
    /// Optional file not present.
    Skipped,
}

/// One field written into a structured target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// Dotted field path.
    pub field: String,
    /// Value before the edit (`None` when absent or null).
    pub previous: Option<String>,
    /// Value written.
    pub value: String,
}

/// Planned or applied result for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    /// Path relative to the repository root.
    pub path: Utf8PathBuf,
    /// Target kind.
    pub kind: TargetKind,
    /// Status.
    pub status: FileStatus,
    /// Field edits (structured targets).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldChange>,
    /// Rule occurrence counts (documentation).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleMatch>,
}

impl FileOutcome {
    fn new(path: &Utf8Path, kind: TargetKind, status: FileStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            kind,
            status,
            fields: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Serializable summary of a propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    /// The version propagated.
    pub version: ReleaseVersion,
    /// Per-target results, in processing order.
    pub files: Vec<FileOutcome>,
    /// Whether changes were written to disk (`false` for dry runs).
    pub written: bool,
}

impl PropagationOutcome {
    /// Paths (relative to the root) of updated files.
    pub fn updated_paths(&self) -> Vec<&Utf8Path> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Updated)
            .map(|f| f.path.as_path())
            .collect()
    }
}

#[derive(Debug, Clone)]
struct PendingWrite {
    path: Utf8PathBuf,
    contents: String,
}

/// Fully computed propagation, not yet written.
#[derive(Debug, Clone)]
pub struct PropagationPlan {
    root: Utf8PathBuf,
    version: ReleaseVersion,
    files: Vec<FileOutcome>,
    writes: Vec<PendingWrite>,
}

impl PropagationPlan {
    /// The version this plan writes.
    pub const fn version(&self) -> &ReleaseVersion {
        &self.version
    }

    /// Per-target results.
    pub fn files(&self) -> &[FileOutcome] {
        &self.files
    }

    /// Whether any file would change.
    pub fn has_changes(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Repository-relative paths of every existing target, for staging.
    pub fn asset_paths(&self) -> Vec<&Utf8Path> {
        self.files
            .iter()
            .filter(|f| f.status != FileStatus::Skipped)
            .map(|f| f.path.as_path())
            .collect()
    }

    /// Summarize without writing.
    pub fn preview(&self) -> PropagationOutcome {
        PropagationOutcome {
            version: self.version.clone(),
            files: self.files.clone(),
            written: false,
        }
    }

    /// Write every changed file.
    #[instrument(skip(self), fields(root = %self.root, version = %self.version))]
    pub fn apply(self) -> PropagateResult<PropagationOutcome> {
        for write in &self.writes {
            write_atomic(&write.path, &write.contents)?;
            info!(path = %write.path, "file updated");
        }
        Ok(PropagationOutcome {
            version: self.version,
            files: self.files,
            written: true,
        })
    }
}

/// Compute a propagation of `version` into the repository at `root`.
///
/// When `notes` is given, they are prepended to the changelog as well.
#[instrument(skip(config, notes), fields(%root, %version))]
pub fn plan(
    root: &Utf8Path,
    version: &ReleaseVersion,
    config: &Config,
    notes: Option<&str>,
) -> PropagateResult<PropagationPlan> {
    let value = version.to_string();
    let mut files = Vec::new();
    let mut writes = Vec::new();
    let mut chart_text = None;
    let mut values_text = None;

    let structured = [
        (TargetKind::HelmChart, &config.files.helm_chart),
        (TargetKind::HelmValues, &config.files.helm_values),
        (TargetKind::FluxChart, &config.files.flux_chart),
    ];
    for (kind, rel) in structured {
        let path = root.join(rel);
        let Some(original) = read_optional(&path)? else {
            debug!(%path, "optional file not present, skipping");
            files.push(FileOutcome::new(rel, kind, FileStatus::Skipped));
            continue;
        };

        let mut text = original.clone();
        let mut fields = Vec::new();
        for field in kind.fields() {
            let edit = yaml::set_field(&text, field, &value).map_err(|source| {
                PropagateError::Yaml {
                    path: rel.clone(),
                    source,
                }
            })?;
            fields.push(FieldChange {
                field: (*field).to_string(),
                previous: edit.previous,
                value: value.clone(),
            });
            text = edit.text;
        }

        let mut outcome = FileOutcome::new(rel, kind, stage(&mut writes, path, &original, text));
        outcome.fields = fields;
        files.push(outcome);

        match kind {
            TargetKind::HelmChart => chart_text = Some(original),
            TargetKind::HelmValues => values_text = Some(original),
            _ => {}
        }
    }

    let detected = detect_image_name(chart_text.as_deref(), values_text.as_deref());
    if config.docs.image_name.is_none() {
        debug!(image = ?detected, "image name detected from chart");
    }
    let rules = DocRules::from_config(&config.docs, detected.as_deref()).map_err(|source| {
        PropagateError::Docs {
            path: config.files.docs.clone(),
            source,
        }
    })?;
    let docs_path = root.join(&config.files.docs);
    let Some(original) = read_optional(&docs_path)? else {
        return Err(PropagateError::MissingRequiredFile {
            path: config.files.docs.clone(),
        });
    };
    let edit = docs::apply_rules(&original, version, &rules).map_err(|source| {
        PropagateError::Docs {
            path: config.files.docs.clone(),
            source,
        }
    })?;
    let mut outcome = FileOutcome::new(
        &config.files.docs,
        TargetKind::Docs,
        stage(&mut writes, docs_path, &original, edit.text),
    );
    outcome.rules = edit.matches;
    files.push(outcome);

    if let Some(notes) = notes {
        let rel = &config.files.changelog;
        let path = root.join(rel);
        let existing = read_optional(&path)?;
        let text = changelog::prepend(
            existing.as_deref(),
            notes,
            config.release.changelog_title.as_deref(),
        );
        let status = stage(&mut writes, path, existing.as_deref().unwrap_or(""), text);
        files.push(FileOutcome::new(rel, TargetKind::Changelog, status));
    }

    debug!(
        changed = writes.len(),
        targets = files.len(),
        "propagation planned"
    );
    Ok(PropagationPlan {
        root: root.to_path_buf(),
        version: version.clone(),
        files,
        writes,
    })
}

/// Image name from `image.repository` in the values, else the chart `name`.
fn detect_image_name(chart: Option<&str>, values: Option<&str>) -> Option<String> {
    let from_values = values
        .and_then(|text| yaml::get_field(text, "image.repository").ok().flatten())
        .and_then(|repository| image_from_repository(&repository).map(str::to_string));
    from_values.or_else(|| {
        chart
            .and_then(|text| yaml::get_field(text, "name").ok().flatten())
            .filter(|name| !name.is_empty())
    })
}

/// `ghcr.io/acme/exporter:1.0@sha256:..` -> `exporter`
fn image_from_repository(repository: &str) -> Option<&str> {
    let last = repository.rsplit('/').next()?;
    let last = last.split('@').next()?;
    let name = last.split(':').next()?;
    (!name.is_empty()).then_some(name)
}

/// Queue a write if `text` differs from `original`.
fn stage(
    writes: &mut Vec<PendingWrite>,
    path: Utf8PathBuf,
    original: &str,
    text: String,
) -> FileStatus {
    if text == original {
        FileStatus::Unchanged
    } else {
        writes.push(PendingWrite {
            path,
            contents: text,
        });
        FileStatus::Updated
    }
}

fn read_optional(path: &Utf8Path) -> PropagateResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PropagateError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replace `path` with `contents` via a sibling temp file and rename.
///
/// Existing files keep their permissions.
fn write_atomic(path: &Utf8Path, contents: &str) -> PropagateResult<()> {
    let write_err = |source| PropagateError::Write {
        path: path.to_path_buf(),
        source,
    };

    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(write_err(e)),
    };
    let Some(permissions) = permissions else {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        return fs::write(path, contents).map_err(write_err);
    };

    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    fs::set_permissions(tmp.path(), permissions).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
