//! Configuration loading and discovery.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults (the layout of a Helm + Flux + README project)
//! 2. `~/.config/relver/config.<ext>` (user config)
//! 3. `.relver.<ext>` or `relver.<ext>` in the working directory or a parent,
//!    stopping at the repository boundary (`.git`)
//! 4. Files passed explicitly (`--config`)
//!
//! Where `<ext>` is one of `toml`, `yaml`, `yml`, `json`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use relver_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! assert_eq!(config.files.docs, "README.md");
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The configuration for relver.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Locations of the files a release rewrites.
    pub files: FilesConfig,
    /// Documentation substitution settings.
    pub docs: DocsConfig,
    /// Release pipeline settings.
    pub release: ReleaseConfig,
}

/// Paths of the release targets, relative to the repository root.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilesConfig {
    /// Helm chart descriptor (`version`, `appVersion`).
    pub helm_chart: Utf8PathBuf,
    /// Helm values descriptor (`image.tag`).
    pub helm_values: Utf8PathBuf,
    /// Flux chart reference (`spec.ref.tag`).
    pub flux_chart: Utf8PathBuf,
    /// Documentation file; must exist.
    pub docs: Utf8PathBuf,
    /// Changelog maintained by `relver release`.
    pub changelog: Utf8PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            helm_chart: "helm/Chart.yaml".into(),
            helm_values: "helm/values.yaml".into(),
            flux_chart: "flux/chart.yaml".into(),
            docs: "README.md".into(),
            changelog: "CHANGELOG.md".into(),
        }
    }
}

/// Documentation substitution settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocsConfig {
    /// Container image name whose `name:X.Y.Z` references are rewritten.
    ///
    /// When unset, the name is taken from the last segment of
    /// `image.repository` in the Helm values, then from the chart `name`.
    /// The image-tag rule is disabled only when neither is available.
    pub image_name: Option<String>,
    /// Fail when any rule finds no occurrence (default: only when all do).
    pub strict: bool,
}

/// Release pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Branches releases may be cut from.
    pub branches: Vec<String>,
    /// Prefix for release tags.
    pub tag_prefix: String,
    /// Remote to push to and to derive repository links from.
    pub remote: String,
    /// Release commit message template.
    ///
    /// Supports `{version}`, `{tag}`, and `{notes}`.
    pub commit_message: String,
    /// First line of the changelog; kept above the newest entry.
    pub changelog_title: Option<String>,
    /// Whether to create a GitHub release.
    pub github_release: bool,
    /// Create the GitHub release as a draft.
    pub draft: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            branches: vec!["main".into()],
            tag_prefix: "v".into(),
            remote: "origin".into(),
            commit_message: "chore(release): {version} [skip ci]\n\n{notes}".into(),
            changelog_title: Some("# Changelog".into()),
            github_release: true,
            draft: false,
        }
    }
}

impl ReleaseConfig {
    /// Render the commit message template.
    pub fn render_commit_message(&self, version: &str, tag: &str, notes: &str) -> String {
        self.commit_message
            .replace("{version}", version)
            .replace("{tag}", tag)
            .replace("{notes}", notes)
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Config file extensions, in order of preference.
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "relver";

/// Marks a repository root; project discovery does not look above it.
const REPO_MARKER: &str = ".git";

/// Merges configuration sources in precedence order.
#[derive(Debug)]
pub struct ConfigLoader {
    search_from: Option<Utf8PathBuf>,
    user_config: bool,
    explicit: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader that reads the user config and nothing else until told where to search.
    pub const fn new() -> Self {
        Self {
            search_from: None,
            user_config: true,
            explicit: Vec::new(),
        }
    }

    /// Look for a project config in `dir` and its parents, up to the repository root.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.search_from = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Whether to read `config.<ext>` from the user config directory.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.user_config = include;
        self
    }

    /// Add an explicit config file. Later files take precedence.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit.push(path.as_ref().to_path_buf());
        self
    }

    /// Config files that will be merged, lowest precedence first.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = self.user_config.then(user_config_file).flatten();
        let project = self.search_from.as_deref().and_then(find_project_config);
        user.into_iter()
            .chain(project)
            .chain(self.explicit.iter().cloned())
            .collect()
    }

    /// Load configuration, merging defaults with every source.
    #[tracing::instrument(skip(self), fields(search_from = ?self.search_from))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources();
        let figment = sources.iter().fold(
            Figment::new().merge(Serialized::defaults(Config::default())),
            |figment, path| merge_file(figment, path),
        );

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            sources = ?sources.iter().map(|p| p.as_str()).collect::<Vec<_>>(),
            docs = %config.files.docs,
            branches = ?config.release.branches,
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Find `.relver.<ext>` or `relver.<ext>` in `start` or a parent.
///
/// The repository root (the directory holding `.git`) is the last directory
/// searched.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    for dir in start.as_ref().ancestors() {
        if let Some(found) = config_in(dir) {
            return Some(found);
        }
        if dir.join(REPO_MARKER).exists() {
            tracing::debug!(repo_root = %dir, "no project config below repository root");
            break;
        }
    }
    None
}

fn config_in(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .flat_map(|ext| {
            [
                dir.join(format!(".{APP_NAME}.{ext}")),
                dir.join(format!("{APP_NAME}.{ext}")),
            ]
        })
        .find(|path| path.is_file())
}

fn user_config_file() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

/// Merge a config file into the figment, picking the format from its extension.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/relver/` on Linux, `~/Library/Application Support/relver/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user data directory path.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A temporary checkout: the directory holds `.git`, so discovery stays inside it.
    fn checkout() -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        (tmp, root)
    }

    fn load_project(name: &str, contents: &str) -> Config {
        let (_tmp, root) = checkout();
        fs::write(root.join(name), contents).unwrap();
        ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&root)
            .load()
            .unwrap()
    }

    #[test]
    fn defaults_describe_helm_flux_readme_layout() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.files.helm_chart, "helm/Chart.yaml");
        assert_eq!(config.files.helm_values, "helm/values.yaml");
        assert_eq!(config.files.flux_chart, "flux/chart.yaml");
        assert_eq!(config.files.docs, "README.md");
        assert_eq!(config.files.changelog, "CHANGELOG.md");
        assert!(config.docs.image_name.is_none());
        assert_eq!(config.release.branches, vec!["main"]);
        assert_eq!(config.release.tag_prefix, "v");
        assert!(config.release.github_release);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = load_project(
            ".relver.toml",
            r#"
log_dir = "/tmp/relver"

[files]
docs = "docs/INSTALL.md"

[docs]
image_name = "dnsrbl-exporter"
strict = true

[release]
branches = ["main", "release"]
"#,
        );
        assert_eq!(config.log_dir.as_deref(), Some(Utf8Path::new("/tmp/relver")));
        assert_eq!(config.files.docs, "docs/INSTALL.md");
        assert_eq!(config.files.helm_chart, "helm/Chart.yaml");
        assert_eq!(config.docs.image_name.as_deref(), Some("dnsrbl-exporter"));
        assert!(config.docs.strict);
        assert_eq!(config.release.branches, vec!["main", "release"]);
        assert_eq!(config.release.remote, "origin");
    }

    #[test]
    fn yaml_and_json_project_files() {
        let config = load_project(
            "relver.yaml",
            "release:\n  tag_prefix: ''\n  draft: true\n  github_release: false\n",
        );
        assert_eq!(config.release.tag_prefix, "");
        assert!(config.release.draft);
        assert!(!config.release.github_release);

        let config = load_project(
            ".relver.json",
            r#"{"files": {"flux_chart": "deploy/flux.yaml"}}"#,
        );
        assert_eq!(config.files.flux_chart, "deploy/flux.yaml");
    }

    #[test]
    fn config_at_repository_root_is_found_from_subdirectory() {
        let (_tmp, root) = checkout();
        let templates = root.join("helm/templates");
        fs::create_dir_all(&templates).unwrap();
        fs::write(root.join(".relver.toml"), r#"log_level = "debug""#).unwrap();

        assert_eq!(
            find_project_config(&templates),
            Some(root.join(".relver.toml"))
        );
    }

    #[test]
    fn search_stops_at_repository_root() {
        let tmp = TempDir::new().unwrap();
        let outer = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let repo = outer.join("repo");
        let helm = repo.join("helm");
        fs::create_dir_all(&helm).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        fs::write(outer.join(".relver.toml"), r#"log_level = "warn""#).unwrap();

        assert_eq!(find_project_config(&helm), None);
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&helm)
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn dotfile_wins_over_plain_name() {
        let (_tmp, root) = checkout();
        fs::write(root.join("relver.toml"), "").unwrap();
        fs::write(root.join(".relver.toml"), "").unwrap();
        assert_eq!(find_project_config(&root), Some(root.join(".relver.toml")));
    }

    #[test]
    fn explicit_files_override_project_config_in_order() {
        let (_tmp, root) = checkout();
        fs::write(root.join(".relver.toml"), r#"log_level = "warn""#).unwrap();
        fs::write(root.join("a.toml"), r#"log_level = "debug""#).unwrap();
        fs::write(root.join("b.toml"), r#"log_level = "error""#).unwrap();

        let loader = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&root)
            .with_file(root.join("a.toml"))
            .with_file(root.join("b.toml"));
        assert_eq!(
            loader.sources(),
            vec![
                root.join(".relver.toml"),
                root.join("a.toml"),
                root.join("b.toml")
            ]
        );
        assert_eq!(loader.load().unwrap().log_level, LogLevel::Error);
    }

    #[test]
    fn invalid_value_is_deserialize_error() {
        let (_tmp, root) = checkout();
        fs::write(root.join(".relver.toml"), "[docs]\nstrict = \"sometimes\"\n").unwrap();
        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&root)
            .load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn commit_message_template() {
        let release = ReleaseConfig::default();
        assert_eq!(
            release.render_commit_message("1.3.0", "v1.3.0", "notes body"),
            "chore(release): 1.3.0 [skip ci]\n\nnotes body"
        );
    }
}
