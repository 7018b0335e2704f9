use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

use super::BIN_NAME;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory (default: dist/share/man/man1)
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

impl Default for ManArgs {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("dist/share/man/man1"),
        }
    }
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = super::prepare_out_dir(&args.out_dir)?;

    let cmd = relver::command();
    render(cmd.clone(), &out_dir.join(format!("{BIN_NAME}.1")))?;

    // `relver-propagate.1`, `relver-release.1`, ...
    for subcommand in cmd.get_subcommands() {
        let name = format!("{BIN_NAME}-{}", subcommand.get_name());
        render(subcommand.clone(), &out_dir.join(format!("{name}.1")))?;
    }

    Ok(())
}

fn render(cmd: clap::Command, path: &Path) -> Result<(), String> {
    let mut buffer: Vec<u8> = Vec::new();
    clap_mangen::Man::new(cmd)
        .render(&mut buffer)
        .map_err(|e| format!("render {}: {e}", path.display()))?;
    fs::write(path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
