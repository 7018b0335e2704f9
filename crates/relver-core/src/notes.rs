//! Release notes rendering.
//!
//! Produces angular-style markdown for one release: a linked version heading
//! followed by sections for breaking changes, features, fixes, performance
//! improvements, and reverts. The same block is used as the changelog entry,
//! the release commit body, and the GitHub release description.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::commits::ConventionalCommit;
use crate::version::ReleaseVersion;

/// Commit types that get their own section, in display order.
const SECTIONS: &[(&str, &str)] = &[
    ("feat", "Features"),
    ("fix", "Bug Fixes"),
    ("perf", "Performance Improvements"),
    ("revert", "Reverts"),
];

/// Everything the renderer needs besides the commits.
#[derive(Debug, Clone)]
pub struct NotesContext<'a> {
    /// The version being released.
    pub version: &'a ReleaseVersion,
    /// Tag for this version.
    pub tag: &'a str,
    /// Tag of the previous release, if any.
    pub previous_tag: Option<&'a str>,
    /// Browsable repository URL (`https://github.com/owner/repo`).
    pub repo_url: Option<&'a str>,
    /// Release date, `YYYY-MM-DD`.
    pub date: &'a str,
}

/// Render release notes for `commits`.
///
/// Patch releases get a `##` heading, minor and major releases `#`.
pub fn render_notes(ctx: &NotesContext<'_>, commits: &[ConventionalCommit]) -> String {
    let level = if ctx.version.patch() == 0 { "#" } else { "##" };
    let mut out = match (ctx.repo_url, ctx.previous_tag) {
        (Some(url), Some(prev)) => format!(
            "{level} [{}]({url}/compare/{prev}...{}) ({})",
            ctx.version, ctx.tag, ctx.date
        ),
        _ => format!("{level} {} ({})", ctx.version, ctx.date),
    };

    let breaking: Vec<(&ConventionalCommit, &str)> = commits
        .iter()
        .flat_map(|c| c.breaking.iter().map(move |note| (c, note.as_str())))
        .collect();
    if !breaking.is_empty() {
        out.push_str("\n\n### ⚠ BREAKING CHANGES\n");
        for (commit, note) in breaking {
            out.push_str(&format!("\n* {}{note}", scope_prefix(commit)));
        }
    }

    for (kind, title) in SECTIONS {
        let mut entries = commits.iter().filter(|c| c.kind == *kind).peekable();
        if entries.peek().is_none() {
            continue;
        }
        out.push_str(&format!("\n\n### {title}\n"));
        for commit in entries {
            out.push_str(&format!(
                "\n* {}{} ({})",
                scope_prefix(commit),
                commit.subject,
                commit_link(commit, ctx.repo_url)
            ));
        }
    }

    out
}

fn scope_prefix(commit: &ConventionalCommit) -> String {
    commit
        .scope
        .as_deref()
        .map(|s| format!("**{s}:** "))
        .unwrap_or_default()
}

fn commit_link(commit: &ConventionalCommit, repo_url: Option<&str>) -> String {
    match repo_url {
        Some(url) => format!("[{}]({url}/commit/{})", commit.short_hash(), commit.hash),
        None => commit.short_hash().to_string(),
    }
}

/// Today's date in UTC as `YYYY-MM-DD`.
pub fn iso_date_today() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    iso_date_from_unix(secs)
}

/// Convert seconds since the Unix epoch to a UTC `YYYY-MM-DD` date.
pub fn iso_date_from_unix(secs: u64) -> String {
    let days = (secs / 86_400) as i64;

    // Hinnant civil_from_days
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i64::from(m <= 2);

    format!("{y:04}-{m:02}-{d:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "abcdef0123456789abcdef0123456789abcdef01";

    fn commit(message: &str) -> ConventionalCommit {
        ConventionalCommit::parse(HASH, message).unwrap()
    }

    fn ctx<'a>(
        version: &'a ReleaseVersion,
        tag: &'a str,
        previous_tag: Option<&'a str>,
        repo_url: Option<&'a str>,
    ) -> NotesContext<'a> {
        NotesContext {
            version,
            tag,
            previous_tag,
            repo_url,
            date: "2026-10-19",
        }
    }

    #[test]
    fn minor_release_with_links() {
        let version = ReleaseVersion::new(1, 3, 0);
        let notes = render_notes(
            &ctx(
                &version,
                "v1.3.0",
                Some("v1.2.3"),
                Some("https://github.com/acme/exporter"),
            ),
            &[commit("feat(helm): add probes"), commit("fix: handle timeouts")],
        );
        assert_eq!(
            notes,
            "# [1.3.0](https://github.com/acme/exporter/compare/v1.2.3...v1.3.0) (2026-10-19)\n\
             \n\
             ### Features\n\
             \n\
             * **helm:** add probes ([abcdef0](https://github.com/acme/exporter/commit/abcdef0123456789abcdef0123456789abcdef01))\n\
             \n\
             ### Bug Fixes\n\
             \n\
             * handle timeouts ([abcdef0](https://github.com/acme/exporter/commit/abcdef0123456789abcdef0123456789abcdef01))"
        );
    }

    #[test]
    fn patch_release_uses_second_level_heading() {
        let version = ReleaseVersion::new(1, 2, 4);
        let notes = render_notes(
            &ctx(&version, "v1.2.4", Some("v1.2.3"), None),
            &[commit("fix: off by one")],
        );
        assert!(notes.starts_with("## 1.2.4 (2026-10-19)"));
        assert!(notes.ends_with("* off by one (abcdef0)"));
    }

    #[test]
    fn first_release_has_no_compare_link() {
        let version = ReleaseVersion::new(1, 0, 0);
        let notes = render_notes(
            &ctx(&version, "v1.0.0", None, Some("https://github.com/acme/exporter")),
            &[commit("feat: initial")],
        );
        assert!(notes.starts_with("# 1.0.0 (2026-10-19)\n"));
    }

    #[test]
    fn breaking_changes_come_first() {
        let version = ReleaseVersion::new(2, 0, 0);
        let notes = render_notes(
            &ctx(&version, "v2.0.0", Some("v1.2.3"), None),
            &[
                commit("feat(api)!: new query format"),
                commit("docs: update readme"),
            ],
        );
        let breaking = notes.find("### ⚠ BREAKING CHANGES").unwrap();
        let features = notes.find("### Features").unwrap();
        assert!(breaking < features);
        assert!(notes.contains("* **api:** new query format\n"));
        assert!(!notes.contains("update readme"));
    }

    #[test]
    fn date_conversion() {
        assert_eq!(iso_date_from_unix(0), "1970-01-01");
        assert_eq!(iso_date_from_unix(951_782_400), "2000-02-29");
        assert_eq!(iso_date_from_unix(1_792_368_000), "2026-10-19");
    }

    #[test]
    fn today_has_date_shape() {
        let date = iso_date_today();
        assert_eq!(date.len(), 10);
        assert_eq!(date.as_bytes()[4], b'-');
        assert_eq!(date.as_bytes()[7], b'-');
    }
}
