//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    // keep log files out of the fixture repositories
    cmd.env("RELVER_LOG_DIR", std::env::temp_dir().join("relver-test-logs"));
    cmd
}

const CHART: &str = "\
apiVersion: v2
name: dnsrbl-exporter
# chart version
version: 1.2.3
appVersion: \"1.2.3\"
";

const VALUES: &str = "\
replicaCount: 1
image:
  repository: ghcr.io/acme/dnsrbl-exporter
  tag: 1.2.3
  pullPolicy: IfNotPresent
";

const FLUX: &str = "\
apiVersion: source.toolkit.fluxcd.io/v1
kind: GitRepository
spec:
  interval: 5m
  ref:
    tag: 'v1.2.3'
";

const FLUX_STREAM: &str = "\
apiVersion: source.toolkit.fluxcd.io/v1
kind: GitRepository
spec:
  ref:
    tag: 1.2.3
---
apiVersion: helm.toolkit.fluxcd.io/v2
kind: HelmRelease
spec:
  chart:
    spec:
      version: 1.2.3
";

const README: &str = "\
# dnsrbl-exporter

    helm install exporter ./helm --version 1.2.3

    gh release download v1.2.3

Tags: `latest`, `1.2.3`, `1.2`, `1`
";

/// A project with every release target present.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("helm")).unwrap();
    fs::create_dir_all(root.join("flux")).unwrap();
    fs::write(root.join("helm/Chart.yaml"), CHART).unwrap();
    fs::write(root.join("helm/values.yaml"), VALUES).unwrap();
    fs::write(root.join("flux/chart.yaml"), FLUX).unwrap();
    fs::write(root.join("README.md"), README).unwrap();
    tmp
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

fn propagate(root: &Path, version: &str) -> assert_cmd::assert::Assert {
    cmd()
        .args(["-C", root.to_str().unwrap(), "propagate", version])
        .assert()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("propagate"))
        .stdout(predicate::str::contains("release"));
}

#[test]
fn long_help_lists_environment() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RELVER_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn invalid_subcommand_shows_error() {
    cmd()
        .arg("not-a-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["-C", "/nonexistent/path/that/does/not/exist", "info"])
        .assert()
        .failure();
}

// =============================================================================
// Info Command
// =============================================================================

#[test]
fn info_json_outputs_valid_json() {
    let tmp = project();
    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info", "--json"])
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout)
        .expect("info --json should output valid JSON");

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    let targets = json["targets"].as_array().unwrap();
    let changelog = targets.iter().find(|t| t["role"] == "Changelog").unwrap();
    assert_eq!(changelog["present"], false);
    assert!(
        targets
            .iter()
            .filter(|t| t["role"] != "Changelog")
            .all(|t| t["present"] == true)
    );
}

#[test]
fn global_flags_accepted() {
    let tmp = TempDir::new().unwrap();
    cmd()
        .args(["-q", "-vv", "--color", "never", "-C"])
        .arg(tmp.path())
        .arg("info")
        .assert()
        .success();
}

// =============================================================================
// Propagate Command
// =============================================================================

#[test]
fn propagate_updates_every_target() {
    let tmp = project();
    let root = tmp.path();

    propagate(root, "1.3.0")
        .success()
        .stdout(predicate::str::contains("Updated 4 file(s)"));

    assert_eq!(read(root, "helm/Chart.yaml"), CHART.replace("1.2.3", "1.3.0"));
    assert_eq!(
        read(root, "helm/values.yaml"),
        VALUES.replace("tag: 1.2.3", "tag: 1.3.0")
    );
    assert_eq!(
        read(root, "flux/chart.yaml"),
        FLUX.replace("'v1.2.3'", "'1.3.0'")
    );

    let readme = read(root, "README.md");
    assert!(readme.contains("--version 1.3.0"));
    assert!(readme.contains("gh release download v1.3.0"));
    assert!(readme.contains("Tags: `latest`, `1.3.0`, `1.3`, `1`"));
    // repository image reference without a tag is left alone
    assert_eq!(
        read(root, "helm/values.yaml").lines().nth(2),
        Some("  repository: ghcr.io/acme/dnsrbl-exporter")
    );
}

#[test]
fn propagate_is_idempotent() {
    let tmp = project();
    let root = tmp.path();

    propagate(root, "2.0.0").success();
    let first: Vec<String> = ["helm/Chart.yaml", "helm/values.yaml", "flux/chart.yaml", "README.md"]
        .iter()
        .map(|f| read(root, f))
        .collect();

    propagate(root, "2.0.0")
        .success()
        .stdout(predicate::str::contains("Already at 2.0.0"));
    let second: Vec<String> = ["helm/Chart.yaml", "helm/values.yaml", "flux/chart.yaml", "README.md"]
        .iter()
        .map(|f| read(root, f))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn propagate_skips_missing_flux_chart() {
    let tmp = project();
    let root = tmp.path();
    fs::remove_file(root.join("flux/chart.yaml")).unwrap();

    propagate(root, "1.3.0")
        .success()
        .stdout(predicate::str::contains("skipped (missing)"));

    assert!(!root.join("flux/chart.yaml").exists());
    assert_eq!(read(root, "helm/Chart.yaml"), CHART.replace("1.2.3", "1.3.0"));
}

#[test]
fn propagate_without_readme_changes_nothing() {
    let tmp = project();
    let root = tmp.path();
    fs::remove_file(root.join("README.md")).unwrap();

    propagate(root, "1.3.0")
        .failure()
        .stderr(predicate::str::contains("README.md"));

    assert_eq!(read(root, "helm/Chart.yaml"), CHART);
    assert_eq!(read(root, "helm/values.yaml"), VALUES);
    assert_eq!(read(root, "flux/chart.yaml"), FLUX);
}

#[test]
fn propagate_edits_multi_document_flux_file() {
    let tmp = project();
    let root = tmp.path();
    fs::write(root.join("flux/chart.yaml"), FLUX_STREAM).unwrap();

    propagate(root, "1.3.0").success();

    assert_eq!(
        read(root, "flux/chart.yaml"),
        FLUX_STREAM.replace("tag: 1.2.3", "tag: 1.3.0")
    );
}

#[test]
fn propagate_rewrites_image_reference_without_config() {
    let tmp = project();
    let root = tmp.path();
    fs::write(
        root.join("README.md"),
        "docker run ghcr.io/acme/dnsrbl-exporter:1.2.3\n--version 1.2.3\n",
    )
    .unwrap();

    propagate(root, "1.3.0").success();

    assert_eq!(
        read(root, "README.md"),
        "docker run ghcr.io/acme/dnsrbl-exporter:1.3.0\n--version 1.3.0\n"
    );
}

#[test]
fn propagate_rejects_malformed_version() {
    let tmp = project();
    propagate(tmp.path(), "1.3")
        .failure()
        .stderr(predicate::str::contains("1.3"));
    assert_eq!(read(tmp.path(), "README.md"), README);
}

#[test]
fn propagate_dry_run_writes_nothing() {
    let tmp = project();
    let root = tmp.path();

    cmd()
        .args(["-C", root.to_str().unwrap(), "propagate", "1.3.0", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would update"));

    assert_eq!(read(root, "helm/Chart.yaml"), CHART);
    assert_eq!(read(root, "README.md"), README);
}

#[test]
fn propagate_json_reports_files() {
    let tmp = project();
    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "propagate", "1.3.0"])
        .assert()
        .success();

    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["version"], "1.3.0");
    assert_eq!(json["written"], true);
    let files = json["files"].as_array().unwrap();
    assert_eq!(files.len(), 4);
    assert!(files.iter().all(|f| f["status"] == "updated"));
}

// =============================================================================
// Release Command
// =============================================================================

fn git(root: &Path, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .ok()?;
    assert!(
        output.status.success(),
        "git {args:?}: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// A released project (tag `v1.2.3`) with one feature commit on top.
///
/// `None` when git is not installed.
fn released_project() -> Option<TempDir> {
    let tmp = project();
    let root = tmp.path();
    git(root, &["init", "--quiet"])?;
    for args in [
        &["symbolic-ref", "HEAD", "refs/heads/main"][..],
        &["config", "user.name", "Release Bot"],
        &["config", "user.email", "bot@example.com"],
        &["config", "commit.gpgsign", "false"],
        &["config", "tag.gpgsign", "false"],
        &["add", "."],
        &["commit", "--quiet", "-m", "chore: initial"],
        &["tag", "-a", "v1.2.3", "-m", "v1.2.3"],
    ] {
        git(root, args)?;
    }
    fs::write(root.join("zones.txt"), "zen.example\n").unwrap();
    git(root, &["add", "zones.txt"])?;
    git(root, &["commit", "--quiet", "-m", "feat(zones): add zen zone"])?;
    Some(tmp)
}

#[test]
fn release_commits_and_tags_locally() {
    let Some(tmp) = released_project() else {
        return;
    };
    let root = tmp.path();

    cmd()
        .args(["-C", root.to_str().unwrap(), "release", "--no-push", "--no-publish", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Released v1.3.0"));

    assert_eq!(read(root, "helm/Chart.yaml"), CHART.replace("1.2.3", "1.3.0"));
    assert!(read(root, "CHANGELOG.md").contains("add zen zone"));

    let subject = git(root, &["log", "-1", "--format=%s"]).unwrap();
    assert_eq!(subject, "chore(release): 1.3.0 [skip ci]");
    let tags = git(root, &["tag", "--list"]).unwrap();
    assert!(tags.contains("v1.3.0"));
    assert_eq!(git(root, &["status", "--porcelain"]).unwrap(), "");
}

#[test]
fn release_dry_run_json() {
    let Some(tmp) = released_project() else {
        return;
    };
    let root = tmp.path();
    let head = git(root, &["rev-parse", "HEAD"]).unwrap();

    let output = cmd()
        .args(["-C", root.to_str().unwrap(), "--json", "release", "--dry-run"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["version"], "1.3.0");
    assert_eq!(json["dry_run"], true);

    assert_eq!(git(root, &["rev-parse", "HEAD"]).unwrap(), head);
    assert_eq!(read(root, "helm/Chart.yaml"), CHART);
}

#[test]
fn release_without_readme_creates_no_commit() {
    let Some(tmp) = released_project() else {
        return;
    };
    let root = tmp.path();
    git(root, &["rm", "--quiet", "README.md"]).unwrap();
    git(root, &["commit", "--quiet", "-m", "fix: drop readme"]).unwrap();
    let head = git(root, &["rev-parse", "HEAD"]).unwrap();

    cmd()
        .args(["-C", root.to_str().unwrap(), "release", "--no-push", "--no-publish", "--yes"])
        .assert()
        .failure();

    assert_eq!(git(root, &["rev-parse", "HEAD"]).unwrap(), head);
    assert_eq!(read(root, "helm/Chart.yaml"), CHART);
    assert!(!git(root, &["tag", "--list"]).unwrap().contains("v1.3.0"));
}

#[test]
fn notes_preview_lists_features() {
    let Some(tmp) = released_project() else {
        return;
    };
    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("### Features"))
        .stdout(predicate::str::contains("**zones:** add zen zone"));
}
