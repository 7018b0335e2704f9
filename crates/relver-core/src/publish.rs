//! GitHub release publication through the `gh` CLI.

use std::io::{self, Write as _};
use std::process::Command;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from release publication.
#[derive(Error, Debug)]
pub enum PublishError {
    /// `gh` could not be started.
    #[error("failed to execute gh: {0}")]
    Exec(#[source] io::Error),

    /// The release notes could not be staged for `gh`.
    #[error("failed to write release notes file: {0}")]
    NotesFile(#[source] io::Error),

    /// `gh` exited with an error.
    #[error("gh release create failed: {stderr}")]
    Command {
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for publication.
pub type PublishResult<T> = Result<T, PublishError>;

/// A GitHub release to create.
#[derive(Debug, Clone)]
pub struct ReleaseRequest<'a> {
    /// Tag the release points at (must already be pushed).
    pub tag: &'a str,
    /// Release body (markdown).
    pub notes: &'a str,
    /// Create as a draft.
    pub draft: bool,
}

impl ReleaseRequest<'_> {
    /// Arguments passed to `gh`, given the notes file location.
    fn args(&self, notes_file: &str) -> Vec<String> {
        let mut args = vec![
            "release".to_string(),
            "create".to_string(),
            self.tag.to_string(),
            "--title".to_string(),
            self.tag.to_string(),
            "--notes-file".to_string(),
            notes_file.to_string(),
        ];
        if self.draft {
            args.push("--draft".to_string());
        }
        args
    }
}

/// Create the release and return its URL, if `gh` printed one.
#[instrument(skip(request), fields(%root, tag = request.tag, draft = request.draft))]
pub fn create_release(root: &Utf8Path, request: &ReleaseRequest<'_>) -> PublishResult<Option<String>> {
    let mut notes_file = tempfile::NamedTempFile::new().map_err(PublishError::NotesFile)?;
    notes_file
        .write_all(request.notes.as_bytes())
        .map_err(PublishError::NotesFile)?;
    let notes_path = notes_file.path().to_string_lossy().to_string();

    let args = request.args(&notes_path);
    debug!(?args, "creating GitHub release");

    let output = Command::new("gh")
        .args(&args)
        .current_dir(root.as_std_path())
        .output()
        .map_err(PublishError::Exec)?;

    if !output.status.success() {
        return Err(PublishError::Command {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(parse_release_url(&String::from_utf8_lossy(&output.stdout)))
}

/// `gh release create` prints the release URL as its last line.
fn parse_release_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| line.starts_with("https://"))
        .map(String::from)
}
