//! Release command, a thin CLI layer over `relver_core::release`.

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relver_core::config::Config;
use relver_core::release::{
    self, PhaseOutcome, ReadyRelease, ReleaseEvent, ReleaseOptions, ReleasePlan, VersionSource,
};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Release this version instead of analyzing commits (e.g., "1.2.3" or "v1.2.3")
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Preview what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip git push (still commits and tags locally)
    #[arg(long)]
    pub no_push: bool,

    /// Skip GitHub release creation
    #[arg(long)]
    pub no_publish: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(
    args: ReleaseArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing release command"
    );

    let options = ReleaseOptions {
        explicit_version: args.version,
        dry_run: args.dry_run,
        no_push: args.no_push,
        no_publish: args.no_publish,
    };
    let is_dry = options.dry_run;

    let ready = match release::plan_release(cwd, config, options)
        .context("release planning failed")?
    {
        ReleasePlan::Ready(ready) => *ready,
        ReleasePlan::NothingToRelease { previous } => {
            if global_json {
                let value = serde_json::json!({
                    "released": false,
                    "previous_version": previous,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let since = previous.map_or_else(|| "the beginning".to_string(), |v| v.to_string());
                println!(
                    "{} No release-worthy commits since {since}",
                    "–".yellow()
                );
            }
            return Ok(());
        }
    };

    if !global_json {
        print_plan_header(&ready, is_dry);
    }

    if !is_dry && !global_json && !args.yes {
        print_phase_summary(&ready);
        let confirmed = Confirm::new("Proceed with release?")
            .with_default(true)
            .prompt()
            .context("confirmation prompt failed")?;
        if !confirmed {
            println!("{}", "Release cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let outcome = ready
        .execute(|event| {
            if !global_json {
                handle_event(event, is_dry);
            }
        })
        .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        super::print_file_outcomes(&outcome.files, is_dry);
        println!();
        if is_dry {
            println!(
                "{} Dry run complete, {} phases previewed",
                "✓".green(),
                outcome.phases.len(),
            );
        } else {
            println!(
                "{} Released {} ({} phases)",
                "✓".green().bold(),
                outcome.tag.green().bold(),
                outcome.phases.len(),
            );
            if let Some(ref url) = outcome.release_url {
                println!("  {}", url.cyan());
            }
        }
    }

    Ok(())
}

fn print_plan_header(ready: &ReadyRelease, is_dry: bool) {
    let info = &ready.info;
    if is_dry {
        println!("\n{}", "DRY RUN: no changes will be made".yellow().bold());
    }
    let previous = info
        .previous
        .as_ref()
        .map_or_else(|| "none".to_string(), ToString::to_string);
    println!(
        "\n{}: {} → {}",
        "Release".bold(),
        previous.dimmed(),
        info.version.to_string().green().bold(),
    );
    let source = match info.source {
        VersionSource::Explicit => "explicit".to_string(),
        VersionSource::Commits(level) => format!("{level} (from commits)"),
        VersionSource::Initial => "initial release".to_string(),
    };
    println!(
        "{}: {} | {}: {}",
        "Strategy".dimmed(),
        source,
        "Commits".dimmed(),
        info.commit_count,
    );
    println!();
}

/// Handle a release event for terminal progress display.
fn handle_event(event: ReleaseEvent, is_dry: bool) {
    match event {
        ReleaseEvent::PhaseStarted(phase) => {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
                spinner.set_style(
                    style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
                );
            }
            spinner.set_message(format!("{phase}..."));
            spinner.enable_steady_tick(Duration::from_millis(80));
            // Phases are synchronous; the spinner only marks the boundary.
            spinner.finish_and_clear();
        }
        ReleaseEvent::PhaseCompleted(phase, outcome) => match outcome {
            PhaseOutcome::Success { message } => {
                let prefix = if is_dry { "○" } else { "✓" };
                println!(
                    "  {} {} {}",
                    prefix.green(),
                    format!("{phase}").bold(),
                    message.dimmed(),
                );
            }
            PhaseOutcome::Skipped { reason } => {
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    format!("{phase}").bold(),
                    format!("skipped: {reason}").dimmed(),
                );
            }
        },
    }
}

/// Print the phases that will run before the confirmation prompt.
fn print_phase_summary(ready: &ReadyRelease) {
    let options = &ready.options;
    let publish = !options.no_publish && !options.no_push && ready.config.release.github_release;
    let phases: &[(&str, bool)] = &[
        ("prepare", true),
        ("commit", ready.propagation.has_changes()),
        ("tag", true),
        ("push", !options.no_push),
        ("publish", publish),
    ];

    let active: Vec<&str> = phases
        .iter()
        .filter(|(_, on)| *on)
        .map(|(n, _)| *n)
        .collect();
    let skipped: Vec<&str> = phases
        .iter()
        .filter(|(_, on)| !*on)
        .map(|(n, _)| *n)
        .collect();

    print!("  {}: {}", "Phases".dimmed(), active.join(", ").bold());
    if !skipped.is_empty() {
        print!(" {}", format!("(skip: {})", skipped.join(", ")).dimmed());
    }
    println!();
    println!(
        "  {}: {} → {}",
        "Tag".dimmed(),
        ready.info.tag.cyan(),
        ready.config.release.remote
    );
    println!();
}
