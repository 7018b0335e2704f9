//! Changelog maintenance: newest release notes go on top.

/// Insert `notes` at the top of a changelog.
///
/// A leading `title` line is kept above the entries. If the changelog
/// already starts with exactly this notes block, it is returned unchanged.
pub fn prepend(existing: Option<&str>, notes: &str, title: Option<&str>) -> String {
    let notes = notes.trim();
    let title = title.map(str::trim).filter(|t| !t.is_empty());

    let Some(existing) = existing.filter(|text| !text.trim().is_empty()) else {
        return match title {
            Some(title) => format!("{title}\n\n{notes}\n"),
            None => format!("{notes}\n"),
        };
    };

    let lead = existing.trim_start();
    let (head, body) = match title {
        Some(title) if lead.strip_prefix(title).is_some_and(is_block_end) => {
            (Some(title), lead[title.len()..].trim_start())
        }
        _ => (None, lead),
    };

    if body.starts_with(notes) && is_block_end(&body[notes.len()..]) {
        return existing.to_string();
    }

    let rest = if body.is_empty() {
        String::new()
    } else {
        format!("\n\n{}", body.trim_end())
    };
    match head.or(title) {
        Some(title) => format!("{title}\n\n{notes}{rest}\n"),
        None => format!("{notes}{rest}\n"),
    }
}

/// Whether `rest` ends a block or heading: nothing, or a line break.
fn is_block_end(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('\n') || rest.starts_with("\r\n")
}
