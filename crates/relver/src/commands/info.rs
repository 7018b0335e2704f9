//! Info command: show package, configuration, and release target information.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use relver_core::config::{self, Config};
use relver_core::git;
use relver_core::version;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_config_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data_dir: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            user_config_dir: config::user_config_dir().map(|p| p.to_string()),
            user_data_dir: config::user_data_dir().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
        }
    }
}

#[derive(Serialize)]
struct TargetInfo {
    role: &'static str,
    path: String,
    required: bool,
    present: bool,
}

#[derive(Serialize)]
struct RepoInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest_release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_url: Option<String>,
}

impl RepoInfo {
    /// `None` outside a git repository.
    fn gather(config: &Config, cwd: &camino::Utf8Path) -> Option<Self> {
        if !git::is_inside_repo(cwd).unwrap_or(false) {
            return None;
        }
        Some(Self {
            branch: git::current_branch(cwd).ok().flatten(),
            latest_release: version::current_version_from_tags(cwd, &config.release.tag_prefix)
                .ok()
                .flatten()
                .map(|v| v.tag(&config.release.tag_prefix)),
            web_url: git::remote_url(cwd, &config.release.remote)
                .ok()
                .flatten()
                .as_deref()
                .and_then(git::web_url),
        })
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    targets: Vec<TargetInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repository: Option<RepoInfo>,
}

fn targets(config: &Config, cwd: &camino::Utf8Path) -> Vec<TargetInfo> {
    let files = &config.files;
    [
        ("Helm chart", &files.helm_chart, false),
        ("Helm values", &files.helm_values, false),
        ("Flux chart", &files.flux_chart, false),
        ("Docs", &files.docs, true),
        ("Changelog", &files.changelog, false),
    ]
    .into_iter()
    .map(|(role, path, required)| TargetInfo {
        role,
        path: path.to_string(),
        required,
        present: cwd.join(path).is_file(),
    })
    .collect()
}

/// Print package information.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Repository root the targets are resolved against
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let full_info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        targets: targets(config, cwd),
        repository: RepoInfo::gather(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&full_info)?);
        return Ok(());
    }

    let package = &full_info.package;
    println!("{} {}", package.name.bold(), package.version.green());
    if !package.description.is_empty() {
        println!("{}", package.description);
    }
    if !package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), package.license);
    }
    if !package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    if let Some(ref path) = full_info.config.config_file {
        println!("{}: {}", "Config file".dimmed(), path.cyan());
    } else {
        println!("{}: {}", "Config file".dimmed(), "none loaded".yellow());
    }
    if let Some(ref dir) = full_info.config.user_config_dir {
        println!("{}: {}", "User config dir".dimmed(), dir);
    }
    println!("{}: {}", "Log level".dimmed(), full_info.config.log_level);
    if let Some(ref dir) = full_info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    println!();
    println!("{}", "Release Targets".bold().underline());
    for target in &full_info.targets {
        let icon = match (target.present, target.required) {
            (true, _) => "✓".green().to_string(),
            (false, true) => "✗".red().to_string(),
            (false, false) => "○".yellow().to_string(),
        };
        let note = match (target.present, target.required) {
            (true, _) => "",
            (false, true) => " (required, missing)",
            (false, false) => " (absent, will be skipped)",
        };
        println!(
            "  {icon} {}: {}{}",
            target.role.dimmed(),
            target.path.cyan(),
            note.dimmed()
        );
    }

    if let Some(ref repo) = full_info.repository {
        println!();
        println!("{}", "Repository".bold().underline());
        if let Some(ref branch) = repo.branch {
            println!("{}: {}", "Branch".dimmed(), branch);
        }
        match repo.latest_release {
            Some(ref tag) => println!("{}: {}", "Latest release".dimmed(), tag.green()),
            None => println!("{}: {}", "Latest release".dimmed(), "none".yellow()),
        }
        if let Some(ref url) = repo.web_url {
            println!("{}: {}", "Web".dimmed(), url.cyan());
        }
    }

    Ok(())
}
