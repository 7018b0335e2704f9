//! Git operations for the release workflow.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! SSH keys, GPG signing, hooks, and other configuration. Every function
//! takes the repository root so callers never depend on the process cwd.

use std::process::Command;

use camino::Utf8Path;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "commit").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A commit as seen by the release analysis: full hash and full message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    /// Full 40-character commit hash.
    pub hash: String,
    /// Raw commit message (subject, body, and footers).
    pub message: String,
}

impl CommitRecord {
    /// Abbreviated hash as shown in release notes.
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }
}

/// Check if `repo` is inside a git work tree.
#[instrument(fields(%repo))]
pub fn is_inside_repo(repo: &Utf8Path) -> GitResult<bool> {
    match git(repo, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check whether the working tree is clean (no uncommitted changes).
#[instrument(fields(%repo))]
pub fn is_clean(repo: &Utf8Path) -> GitResult<bool> {
    let output = git(repo, &["status", "--porcelain"])?;
    let clean = output.trim().is_empty();
    debug!(clean, "working tree status");
    Ok(clean)
}

/// Get the current branch name.
///
/// Returns `None` in a detached HEAD state.
#[instrument(fields(%repo))]
pub fn current_branch(repo: &Utf8Path) -> GitResult<Option<String>> {
    let output = git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = output.trim().to_string();
    if branch == "HEAD" {
        debug!("detached HEAD");
        Ok(None)
    } else {
        debug!(%branch, "current branch");
        Ok(Some(branch))
    }
}

/// List tags starting with `prefix`, highest version first.
#[instrument(fields(%repo))]
pub fn version_tags(repo: &Utf8Path, prefix: &str) -> GitResult<Vec<String>> {
    let pattern = format!("{prefix}*");
    let output = git(
        repo,
        &["tag", "--list", &pattern, "--sort=-version:refname"],
    )?;
    let tags: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!(count = tags.len(), "version tags");
    Ok(tags)
}

/// Get every commit reachable from HEAD but not from `since` (all commits
/// when `None`), newest first.
#[instrument(fields(%repo))]
pub fn commits_since(repo: &Utf8Path, since: Option<&str>) -> GitResult<Vec<CommitRecord>> {
    let range = since.map_or_else(|| "HEAD".to_string(), |tag| format!("{tag}..HEAD"));

    // %x1f separates hash from message, %x1e terminates each record
    let output = git(repo, &["log", &range, "--format=%H%x1f%B%x1e"])?;

    let commits = parse_log_records(&output);
    debug!(count = commits.len(), "commits since last release");
    Ok(commits)
}

/// Split the `%H%x1f%B%x1e` log format into records.
fn parse_log_records(output: &str) -> Vec<CommitRecord> {
    output
        .split('\x1e')
        .filter_map(|record| {
            let record = record.trim_start_matches(['\n', '\r']);
            let (hash, message) = record.split_once('\x1f')?;
            let hash = hash.trim();
            if hash.is_empty() {
                return None;
            }
            Some(CommitRecord {
                hash: hash.to_string(),
                message: message.trim_end().to_string(),
            })
        })
        .collect()
}

/// Get the remote URL for a named remote.
#[instrument(fields(%repo))]
pub fn remote_url(repo: &Utf8Path, remote: &str) -> GitResult<Option<String>> {
    match git(repo, &["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Parse owner and repo from a git remote URL.
///
/// Handles both HTTPS and SSH formats:
/// - `https://github.com/owner/repo.git`
/// - `git@github.com:owner/repo.git`
///
/// Returns `None` if the URL cannot be parsed.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let path = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|after_scheme| after_scheme.split_once('/').map(|(_, path)| path))
        },
        |rest| rest.split_once(':').map(|(_, path)| path),
    )?;

    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, repo) = path.split_once('/')?;

    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}

/// Derive a browsable `https://<host>/<owner>/<repo>` URL from a remote URL.
pub fn web_url(url: &str) -> Option<String> {
    let host = url.strip_prefix("git@").map_or_else(
        || {
            url.split("//")
                .nth(1)
                .and_then(|rest| rest.split('/').next())
                .map(|host| host.rsplit('@').next().unwrap_or(host))
        },
        |rest| rest.split_once(':').map(|(host, _)| host),
    )?;
    let (owner, repo) = parse_owner_repo(url)?;
    if host.is_empty() {
        return None;
    }
    Some(format!("https://{host}/{owner}/{repo}"))
}

/// Stage the given paths (relative to `repo`).
#[instrument(fields(%repo))]
pub fn add(repo: &Utf8Path, paths: &[&str]) -> GitResult<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let mut args = vec!["add", "--"];
    args.extend_from_slice(paths);
    git(repo, &args)?;
    debug!(count = paths.len(), "staged files");
    Ok(())
}

/// Create a commit from the staged changes and return its hash.
#[instrument(skip(message), fields(%repo))]
pub fn commit(repo: &Utf8Path, message: &str) -> GitResult<String> {
    git(repo, &["commit", "--cleanup=whitespace", "--message", message])?;
    let hash = git(repo, &["rev-parse", "HEAD"])?.trim().to_string();
    debug!(%hash, "created commit");
    Ok(hash)
}

/// Create an annotated tag at HEAD.
#[instrument(skip(message), fields(%repo))]
pub fn create_tag(repo: &Utf8Path, tag: &str, message: &str) -> GitResult<()> {
    git(repo, &["tag", "--annotate", tag, "--message", message])?;
    debug!(%tag, "created tag");
    Ok(())
}

/// Push `branch` to `remote`, including annotated tags reachable from it.
#[instrument(fields(%repo))]
pub fn push(repo: &Utf8Path, remote: &str, branch: &str) -> GitResult<()> {
    git(repo, &["push", "--follow-tags", remote, branch])?;
    debug!(%remote, %branch, "pushed");
    Ok(())
}

/// Run a git command in `repo` and return its stdout.
fn git(repo: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo.as_std_path())
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
