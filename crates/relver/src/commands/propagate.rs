//! Propagate command: write a version into every release asset.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use relver_core::config::Config;
use relver_core::propagate;
use relver_core::version::ReleaseVersion;

/// Arguments for the `propagate` subcommand.
#[derive(Args, Debug, Default)]
pub struct PropagateArgs {
    /// Version to write (e.g., "1.3.0" or "v1.3.0")
    #[arg(value_name = "VERSION")]
    pub version: String,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the propagate command.
#[instrument(name = "cmd_propagate", skip_all, fields(version = %args.version))]
pub fn cmd_propagate(
    args: PropagateArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing propagate command"
    );

    let version = ReleaseVersion::parse(&args.version)
        .with_context(|| format!("invalid release version '{}'", args.version))?;

    let plan =
        propagate::plan(cwd, &version, config, None).context("failed to plan propagation")?;

    let outcome = if args.dry_run {
        plan.preview()
    } else {
        plan.apply().context("failed to write release assets")?
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if args.dry_run {
        println!("\n{}", "DRY RUN: no files will be written".yellow().bold());
    }
    println!("\n{} {}", "Propagate".bold(), version.to_string().green().bold());
    println!();
    super::print_file_outcomes(&outcome.files, args.dry_run);
    println!();

    let updated = outcome.updated_paths().len();
    if updated == 0 {
        println!("{} Already at {version}", "✓".green());
    } else if args.dry_run {
        println!("{} {updated} file(s) would change", "○".green());
    } else {
        println!("{} Updated {updated} file(s)", "✓".green().bold());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn fixture() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(root.join("README.md"), "helm install x --version 1.2.3\n").unwrap();
        (tmp, root)
    }

    #[test]
    fn rejects_invalid_version() {
        let (_tmp, root) = fixture();
        let args = PropagateArgs {
            version: "1.2".into(),
            dry_run: false,
        };
        assert!(cmd_propagate(args, false, &Config::default(), &root).is_err());
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let (_tmp, root) = fixture();
        let args = PropagateArgs {
            version: "2.0.0".into(),
            dry_run: true,
        };
        cmd_propagate(args, true, &Config::default(), &root).unwrap();
        let readme = std::fs::read_to_string(root.join("README.md")).unwrap();
        assert!(readme.contains("1.2.3"));
    }

    #[test]
    fn writes_version() {
        let (_tmp, root) = fixture();
        let args = PropagateArgs {
            version: "v2.0.0".into(),
            dry_run: false,
        };
        cmd_propagate(args, false, &Config::default(), &root).unwrap();
        let readme = std::fs::read_to_string(root.join("README.md")).unwrap();
        assert_eq!(readme, "helm install x --version 2.0.0\n");
    }
}
