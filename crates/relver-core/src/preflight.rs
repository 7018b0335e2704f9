//! Preflight checks for release readiness.
//!
//! Validates the repository, working tree, release branch, and external tool
//! availability before a release touches anything. Returns structured results
//! that the CLI formats.

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::git;

/// A single preflight check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Human-readable name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Description of the result (reason for failure, or confirmation).
    pub message: String,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
        }
    }
}

/// Full preflight report.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Whether all checks passed.
    pub all_passed: bool,
}

impl PreflightReport {
    /// Messages of the failed checks.
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.message.as_str())
            .collect()
    }
}

/// Run all preflight checks.
///
/// `needs_gh` adds the GitHub CLI to the required tools.
#[instrument(skip(config), fields(%root))]
pub fn run_preflight(root: &Utf8Path, config: &Config, needs_gh: bool) -> PreflightReport {
    let mut checks = vec![check_required_tools(needs_gh)];

    let in_repo = check_git_repo(root);
    let is_repo = in_repo.passed;
    checks.push(in_repo);

    if is_repo {
        checks.push(check_clean_tree(root));
        checks.push(check_release_branch(root, &config.release.branches));
    }

    let all_passed = checks.iter().all(|c| c.passed);
    debug!(all_passed, check_count = checks.len(), "preflight complete");

    PreflightReport { checks, all_passed }
}

fn check_git_repo(root: &Utf8Path) -> CheckResult {
    const NAME: &str = "Git repository";
    match git::is_inside_repo(root) {
        Ok(true) => CheckResult::new(NAME, true, "Inside a git repository"),
        Ok(false) => CheckResult::new(NAME, false, "Not inside a git repository"),
        Err(e) => CheckResult::new(NAME, false, format!("Failed to check: {e}")),
    }
}

fn check_clean_tree(root: &Utf8Path) -> CheckResult {
    const NAME: &str = "Working tree";
    match git::is_clean(root) {
        Ok(true) => CheckResult::new(NAME, true, "Clean working tree"),
        Ok(false) => CheckResult::new(NAME, false, "Uncommitted changes in working tree"),
        Err(e) => CheckResult::new(NAME, false, format!("Failed to check: {e}")),
    }
}

fn check_release_branch(root: &Utf8Path, branches: &[String]) -> CheckResult {
    const NAME: &str = "Release branch";
    let current = match git::current_branch(root) {
        Ok(Some(b)) => b,
        Ok(None) => return CheckResult::new(NAME, false, "Detached HEAD, not on any branch"),
        Err(e) => return CheckResult::new(NAME, false, format!("Failed to check: {e}")),
    };

    if branches.iter().any(|b| *b == current) {
        CheckResult::new(NAME, true, format!("On release branch '{current}'"))
    } else {
        CheckResult::new(
            NAME,
            false,
            format!("On '{current}', releases run from: {}", branches.join(", ")),
        )
    }
}

fn check_required_tools(needs_gh: bool) -> CheckResult {
    let mut required = vec!["git"];
    if needs_gh {
        required.push("gh");
    }

    let missing: Vec<&str> = required
        .into_iter()
        .filter(|bin| which::which(bin).is_err())
        .collect();

    if missing.is_empty() {
        CheckResult::new("Required tools", true, "All required tools are installed")
    } else {
        CheckResult::new(
            "Required tools",
            false,
            format!("Missing tools: {}", missing.join(", ")),
        )
    }
}
