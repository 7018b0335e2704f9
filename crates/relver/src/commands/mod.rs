//! Command implementations

pub mod info;

pub mod notes;

pub mod preflight;

pub mod propagate;

pub mod release;

use owo_colors::OwoColorize;
use relver_core::propagate::{FileOutcome, FileStatus};

/// Print one line per propagation target.
///
/// Shared by `propagate` and `release`, which both report file outcomes.
pub fn print_file_outcomes(files: &[FileOutcome], is_dry: bool) {
    for file in files {
        let (icon, label) = match file.status {
            FileStatus::Updated if is_dry => ("○".green().to_string(), "would update"),
            FileStatus::Updated => ("✓".green().to_string(), "updated"),
            FileStatus::Unchanged => ("=".dimmed().to_string(), "unchanged"),
            FileStatus::Skipped => ("–".yellow().to_string(), "skipped (missing)"),
        };
        println!("  {icon} {} {}", file.path.as_str().bold(), label.dimmed());

        for field in &file.fields {
            let previous = field.previous.as_deref().unwrap_or("(unset)");
            if previous != field.value {
                println!(
                    "      {}: {} → {}",
                    field.field.dimmed(),
                    previous.dimmed(),
                    field.value.green()
                );
            }
        }
        for rule in &file.rules {
            if rule.count > 0 {
                println!(
                    "      {}: {} match(es)",
                    rule.rule.dimmed(),
                    rule.count.to_string().cyan()
                );
            }
        }
    }
}
