//! Version substitution in free-form documentation.
//!
//! README files mention the release version in a handful of well-known
//! shapes: an install flag, a `gh release download` invocation, an image
//! reference, and a line listing the published image tags. Each shape is
//! one [`DocRule`]; every occurrence of every rule is rewritten.

use regex::{NoExpand, Regex};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::DocsConfig;
use crate::version::ReleaseVersion;

const TRIPLE: &str = r"[0-9]+\.[0-9]+\.[0-9]+";

/// Errors from documentation substitution.
#[derive(Error, Debug)]
pub enum DocsError {
    /// The document does not contain the expected version patterns.
    #[error("documentation patterns matched nothing: {}", .rules.join(", "))]
    PatternMismatch {
        /// Names of the rules that found no occurrence.
        rules: Vec<String>,
    },

    /// A rule pattern failed to compile.
    #[error("invalid documentation pattern for {rule}: {source}")]
    Pattern {
        /// Rule name.
        rule: &'static str,
        /// The underlying regex error.
        source: regex::Error,
    },
}

/// Result alias for documentation substitution.
pub type DocsResult<T> = Result<T, DocsError>;

/// Which part of the version a rule writes.
#[derive(Debug, Clone)]
enum Replacement {
    /// `<prefix><major.minor.patch>`
    Version { prefix: String },
    /// ``Tags: `latest`, `X.Y.Z`, `X.Y`, `X` ``
    TagList,
}

/// One substitution rule.
#[derive(Debug, Clone)]
pub struct DocRule {
    name: &'static str,
    pattern: Regex,
    replacement: Replacement,
}

impl DocRule {
    fn new(name: &'static str, pattern: &str, replacement: Replacement) -> DocsResult<Self> {
        let pattern = Regex::new(pattern).map_err(|source| DocsError::Pattern {
            rule: name,
            source,
        })?;
        Ok(Self {
            name,
            pattern,
            replacement,
        })
    }

    /// The rule's name, e.g. `install-flag`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn render(&self, version: &ReleaseVersion) -> String {
        match &self.replacement {
            Replacement::Version { prefix } => format!("{prefix}{version}"),
            Replacement::TagList => format!(
                "Tags: `latest`, `{version}`, `{}`, `{}`",
                version.major_minor(),
                version.major()
            ),
        }
    }
}

/// The rule set applied to one documentation file.
#[derive(Debug, Clone)]
pub struct DocRules {
    rules: Vec<DocRule>,
    strict: bool,
}

impl DocRules {
    /// Build the standard rules.
    ///
    /// The `image-tag` rule is only enabled when an image name is given.
    pub fn new(image_name: Option<&str>, strict: bool) -> DocsResult<Self> {
        let mut rules = vec![
            DocRule::new(
                "install-flag",
                &format!("--version {TRIPLE}"),
                Replacement::Version {
                    prefix: "--version ".into(),
                },
            )?,
            DocRule::new(
                "release-download",
                &format!("gh release download v{TRIPLE}"),
                Replacement::Version {
                    prefix: "gh release download v".into(),
                },
            )?,
        ];

        if let Some(image) = image_name.filter(|name| !name.is_empty()) {
            rules.push(DocRule::new(
                "image-tag",
                &format!("{}:{TRIPLE}", regex::escape(image)),
                Replacement::Version {
                    prefix: format!("{image}:"),
                },
            )?);
        }

        rules.push(DocRule::new(
            "tag-list",
            r"Tags: `latest`, `[0-9]+\.[0-9]+\.[0-9]+`, `[0-9]+\.[0-9]+`, `[0-9]+`",
            Replacement::TagList,
        )?);

        Ok(Self { rules, strict })
    }

    /// Build rules from the `[docs]` configuration section.
    ///
    /// `detected_image` names the image when `image_name` is not configured.
    pub fn from_config(config: &DocsConfig, detected_image: Option<&str>) -> DocsResult<Self> {
        Self::new(
            config.image_name.as_deref().or(detected_image),
            config.strict,
        )
    }

    /// The enabled rules, in application order.
    pub fn rules(&self) -> &[DocRule] {
        &self.rules
    }
}

/// How many occurrences one rule rewrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleMatch {
    /// Rule name.
    pub rule: String,
    /// Number of occurrences found.
    pub count: usize,
}

/// Outcome of applying all rules to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocsEdit {
    /// The document after substitution.
    pub text: String,
    /// Per-rule occurrence counts, in rule order.
    pub matches: Vec<RuleMatch>,
}

impl DocsEdit {
    /// Total occurrences across all rules.
    pub fn total(&self) -> usize {
        self.matches.iter().map(|m| m.count).sum()
    }
}

/// Rewrite every version occurrence in `text`.
///
/// Fails with [`DocsError::PatternMismatch`] when no rule matches at all, or,
/// in strict mode, when any single rule matches nothing.
#[instrument(skip(text, rules), fields(%version, len = text.len()))]
pub fn apply_rules(text: &str, version: &ReleaseVersion, rules: &DocRules) -> DocsResult<DocsEdit> {
    let mut current = text.to_string();
    let mut matches = Vec::with_capacity(rules.rules.len());

    for rule in &rules.rules {
        let count = rule.pattern.find_iter(&current).count();
        if count > 0 {
            let replacement = rule.render(version);
            current = rule
                .pattern
                .replace_all(&current, NoExpand(&replacement))
                .into_owned();
        }
        debug!(rule = rule.name, count, "rule applied");
        matches.push(RuleMatch {
            rule: rule.name.to_string(),
            count,
        });
    }

    let unmatched: Vec<String> = matches
        .iter()
        .filter(|m| m.count == 0)
        .map(|m| m.rule.clone())
        .collect();

    if unmatched.len() == matches.len() || (rules.strict && !unmatched.is_empty()) {
        return Err(DocsError::PatternMismatch { rules: unmatched });
    }
    for rule in &unmatched {
        warn!(%rule, "documentation rule matched nothing");
    }

    Ok(DocsEdit {
        text: current,
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const README: &str = "\
# dnsrbl-exporter

Install the chart:

    helm install dnsrbl ./helm --version 1.2.3

Or grab the binary:

    gh release download v1.2.3 --pattern '*linux*'

Run it:

    docker run ghcr.io/acme/dnsrbl-exporter:1.2.3

Tags: `latest`, `1.2.3`, `1.2`, `1`
";

    fn rules() -> DocRules {
        DocRules::new(Some("dnsrbl-exporter"), false).unwrap()
    }

    #[test]
    fn rewrites_every_pattern() {
        let edit = apply_rules(README, &ReleaseVersion::new(1, 3, 0), &rules()).unwrap();
        assert!(edit.text.contains("--version 1.3.0"));
        assert!(edit.text.contains("gh release download v1.3.0 --pattern"));
        assert!(edit.text.contains("dnsrbl-exporter:1.3.0"));
        assert!(edit.text.contains("Tags: `latest`, `1.3.0`, `1.3`, `1`"));
        assert!(!edit.text.contains("1.2.3"));
        assert_eq!(edit.total(), 4);
    }

    #[test]
    fn leaves_other_text_alone() {
        let edit = apply_rules(README, &ReleaseVersion::new(1, 3, 0), &rules()).unwrap();
        let expected = README
            .replace("--version 1.2.3", "--version 1.3.0")
            .replace("download v1.2.3", "download v1.3.0")
            .replace("exporter:1.2.3", "exporter:1.3.0")
            .replace("`1.2.3`, `1.2`, `1`", "`1.3.0`, `1.3`, `1`");
        assert_eq!(edit.text, expected);
    }

    #[test]
    fn major_release_tag_line() {
        let edit = apply_rules(README, &ReleaseVersion::new(2, 0, 0), &rules()).unwrap();
        assert!(edit.text.contains("Tags: `latest`, `2.0.0`, `2.0`, `2`"));
        assert!(edit.text.contains("--version 2.0.0"));
        assert!(edit.text.contains("gh release download v2.0.0"));
    }

    #[test]
    fn replaces_all_occurrences() {
        let text = "a --version 0.1.0\nb --version 0.9.9\n";
        let edit = apply_rules(text, &ReleaseVersion::new(1, 0, 0), &rules()).unwrap();
        assert_eq!(edit.text, "a --version 1.0.0\nb --version 1.0.0\n");
        assert_eq!(edit.matches[0].count, 2);
    }

    #[test]
    fn idempotent() {
        let version = ReleaseVersion::new(1, 3, 0);
        let once = apply_rules(README, &version, &rules()).unwrap();
        let twice = apply_rules(&once.text, &version, &rules()).unwrap();
        assert_eq!(once.text, twice.text);
    }

    #[test]
    fn no_match_is_pattern_mismatch() {
        let result = apply_rules("# nothing here\n", &ReleaseVersion::new(1, 0, 0), &rules());
        match result {
            Err(DocsError::PatternMismatch { rules }) => assert_eq!(rules.len(), 4),
            other => panic!("expected PatternMismatch, got {other:?}"),
        }
    }

    #[test]
    fn partial_match_is_allowed_unless_strict() {
        let text = "helm install x --version 1.2.3\n";
        let version = ReleaseVersion::new(1, 3, 0);
        let edit = apply_rules(text, &version, &rules()).unwrap();
        assert_eq!(edit.text, "helm install x --version 1.3.0\n");

        let strict = DocRules::new(Some("dnsrbl-exporter"), true).unwrap();
        assert!(matches!(
            apply_rules(text, &version, &strict),
            Err(DocsError::PatternMismatch { .. })
        ));
    }

    #[test]
    fn image_rule_disabled_without_name() {
        let rules = DocRules::new(None, false).unwrap();
        assert!(rules.rules().iter().all(|r| r.name() != "image-tag"));
        let edit = apply_rules(README, &ReleaseVersion::new(1, 3, 0), &rules).unwrap();
        assert!(edit.text.contains("dnsrbl-exporter:1.2.3"));
    }

    #[test]
    fn configured_image_name_wins_over_detected() {
        let config = DocsConfig {
            image_name: Some("exporter".into()),
            strict: false,
        };
        let rules = DocRules::from_config(&config, Some("other")).unwrap();
        let edit = apply_rules("exporter:1.0.0 other:1.0.0\n", &ReleaseVersion::new(1, 1, 0), &rules)
            .unwrap();
        assert_eq!(edit.text, "exporter:1.1.0 other:1.0.0\n");

        let detected = DocRules::from_config(&DocsConfig::default(), Some("other")).unwrap();
        assert!(detected.rules().iter().any(|r| r.name() == "image-tag"));
    }

    #[test]
    fn image_name_is_matched_literally() {
        let rules = DocRules::new(Some("app.v2"), false).unwrap();
        let text = "app.v2:1.0.0 appXv2:1.0.0\n";
        let edit = apply_rules(text, &ReleaseVersion::new(1, 1, 0), &rules).unwrap();
        assert_eq!(edit.text, "app.v2:1.1.0 appXv2:1.0.0\n");
    }

    #[test]
    fn tag_line_requires_exact_shape() {
        let text = "Tags: `latest`, `1.2.3`, `1.2`\n--version 1.2.3\n";
        let edit = apply_rules(text, &ReleaseVersion::new(1, 3, 0), &rules()).unwrap();
        assert!(edit.text.starts_with("Tags: `latest`, `1.2.3`, `1.2`\n"));
    }
}
