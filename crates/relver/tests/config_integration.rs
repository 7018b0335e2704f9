//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and that configured
//! target paths and rules reach the propagator, using the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    // keep log files out of the fixture repositories
    cmd.env("RELVER_LOG_DIR", std::env::temp_dir().join("relver-test-logs"));
    cmd
}

fn info_json(dir: &Path) -> serde_json::Value {
    let output = cmd()
        .args(["-C", dir.to_str().unwrap(), "--json", "info"])
        .assert()
        .success();
    serde_json::from_slice(&output.get_output().stdout).expect("info --json should be JSON")
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let json = info_json(tmp.path());
    assert!(json["config"]["config_file"].is_null());
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".relver.toml"), r#"log_level = "debug""#).unwrap();

    let json = info_json(tmp.path());
    assert!(json["config"]["config_file"]
        .as_str()
        .unwrap()
        .ends_with(".relver.toml"));
    assert_eq!(json["config"]["log_level"], "debug");
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join("relver.toml"), r#"log_level = "warn""#).unwrap();

    cmd()
        .args(["-C", sub_dir.to_str().unwrap(), "info"])
        .assert()
        .success();
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(parent.join(".relver.toml"), r#"log_level = "error""#).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    let json = info_json(&src);
    assert!(json["config"]["config_file"].is_null());
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".relver.yaml"),
        "files:\n  docs: docs/index.md\n",
    )
    .unwrap();

    let json = info_json(tmp.path());
    let docs = json["targets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["role"] == "Docs")
        .unwrap();
    assert_eq!(docs["path"], "docs/index.md");
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".relver.json"),
        r#"{"release": {"tag_prefix": "release-"}}"#,
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .success();
}

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".relver.toml"), "this is not valid toml [[[").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn explicit_config_flag_is_loaded() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("custom.toml");
    fs::write(&config, r#"log_level = "warn""#).unwrap();

    let output = cmd()
        .args([
            "-C",
            tmp.path().to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--json",
            "info",
        ])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["config"]["log_level"], "warn");
}

// =============================================================================
// Configured Targets
// =============================================================================

#[test]
fn configured_paths_are_propagated() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(
        root.join(".relver.toml"),
        r#"
[files]
helm_chart = "deploy/chart/Chart.yaml"
docs = "docs/index.md"
"#,
    )
    .unwrap();
    fs::create_dir_all(root.join("deploy/chart")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(
        root.join("deploy/chart/Chart.yaml"),
        "name: x\nversion: 0.1.0\nappVersion: 0.1.0\n",
    )
    .unwrap();
    fs::write(root.join("docs/index.md"), "--version 0.1.0\n").unwrap();

    cmd()
        .args(["-C", root.to_str().unwrap(), "propagate", "0.2.0"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(root.join("deploy/chart/Chart.yaml")).unwrap(),
        "name: x\nversion: 0.2.0\nappVersion: 0.2.0\n"
    );
    assert_eq!(
        fs::read_to_string(root.join("docs/index.md")).unwrap(),
        "--version 0.2.0\n"
    );
}

#[test]
fn image_name_enables_image_tag_rule() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(
        root.join(".relver.toml"),
        "[docs]\nimage_name = \"dnsrbl-exporter\"\n",
    )
    .unwrap();
    fs::write(
        root.join("README.md"),
        "docker pull ghcr.io/acme/dnsrbl-exporter:1.2.3\n",
    )
    .unwrap();

    cmd()
        .args(["-C", root.to_str().unwrap(), "propagate", "1.3.0"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "docker pull ghcr.io/acme/dnsrbl-exporter:1.3.0\n"
    );
}

#[test]
fn strict_docs_rejects_unmatched_rules() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::write(root.join(".relver.toml"), "[docs]\nstrict = true\n").unwrap();
    fs::write(root.join("README.md"), "--version 1.2.3\n").unwrap();

    cmd()
        .args(["-C", root.to_str().unwrap(), "propagate", "1.3.0"])
        .assert()
        .failure();

    assert_eq!(
        fs::read_to_string(root.join("README.md")).unwrap(),
        "--version 1.2.3\n"
    );
}
