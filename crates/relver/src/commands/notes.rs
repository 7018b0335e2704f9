//! Notes command, a thin CLI layer over `relver_core::release::resolve_release`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relver_core::config::Config;
use relver_core::release;

/// Arguments for the `notes` subcommand.
#[derive(Args, Debug, Default)]
pub struct NotesArgs {
    /// Version to render notes for (default: computed from commits)
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,
}

/// Execute the notes command.
#[instrument(name = "cmd_notes", skip_all)]
pub fn cmd_notes(
    args: NotesArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(version = ?args.version, "rendering release notes preview");

    let info = release::resolve_release(cwd, config, args.version.as_deref())
        .context("failed to resolve the next release")?;

    match (info, global_json) {
        (Some(info), true) => println!("{}", serde_json::to_string_pretty(&info)?),
        (Some(info), false) => println!("{}", info.notes),
        (None, true) => println!("{}", serde_json::json!({ "released": false })),
        (None, false) => eprintln!(
            "{} No release-worthy commits since the last release",
            "–".yellow()
        ),
    }

    Ok(())
}
