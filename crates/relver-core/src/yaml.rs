//! Comment-preserving scalar edits for YAML mapping documents.
//!
//! Helm and Flux descriptors are hand-maintained files full of comments, so
//! re-serializing them through a YAML library would rewrite far more than
//! the one field a release touches. Instead this module walks the document
//! line by line, tracks the block-mapping path by indentation, and rewrites
//! only the bytes of the target scalar. The result is then parsed with
//! `serde-saphyr` and the field is read back to confirm the edit landed.
//!
//! Supported shape: block mappings (optionally nested inside sequence items),
//! plain / single-quoted / double-quoted scalars, trailing comments, block
//! scalars (skipped), and document markers. Flow collections are treated as
//! opaque values. In a multi-document stream every document that already
//! holds the field is rewritten.
//!
//! # Example
//!
//! ```
//! use relver_core::yaml::set_field;
//!
//! let edit = set_field("image:\n  tag: \"1.2.3\" # pinned\n", "image.tag", "1.3.0").unwrap();
//! assert_eq!(edit.text, "image:\n  tag: \"1.3.0\" # pinned\n");
//! assert_eq!(edit.previous.as_deref(), Some("1.2.3"));
//! ```

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from YAML field edits.
#[derive(Error, Debug)]
pub enum YamlError {
    /// The document (before or after the edit) is not valid YAML.
    #[error("invalid YAML: {0}")]
    Parse(String),

    /// The addressed node exists but holds a mapping, sequence, or block scalar.
    #[error("`{path}` is not a scalar value")]
    NotAScalar {
        /// Dotted field path.
        path: String,
    },

    /// A missing field cannot be created because an ancestor is not a mapping.
    #[error("cannot create `{path}`: `{parent}` is not a mapping")]
    NotAMapping {
        /// Dotted field path.
        path: String,
        /// Dotted path of the offending ancestor.
        parent: String,
    },

    /// The edited document does not read back the expected value.
    #[error("`{path}` reads back as {found:?} after the edit, expected {expected:?}")]
    Verify {
        /// Dotted field path.
        path: String,
        /// The value that was written.
        expected: String,
        /// What the parser actually sees.
        found: Option<String>,
    },
}

/// Result alias for YAML edits.
pub type YamlResult<T> = Result<T, YamlError>;

/// Outcome of setting one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    /// The full document after the edit.
    pub text: String,
    /// The previous scalar value, or `None` if the field was absent or null.
    pub previous: Option<String>,
    /// Whether `text` differs from the input.
    pub changed: bool,
}

/// Set the scalar at dotted `path` to `value`, preserving everything else.
///
/// Missing keys are created under the deepest existing ancestor. `previous`
/// reports the value from the first document holding the field.
#[instrument(skip(source), fields(len = source.len()))]
pub fn set_field(source: &str, path: &str, value: &str) -> YamlResult<FieldEdit> {
    let segments: Vec<&str> = path.split('.').collect();
    parse_documents(source)?;

    let lines = split_lines(source);
    let found = locate_all(&lines, &segments);
    let (text, previous) = if found.is_empty() {
        (insert_path(source, &lines, &segments, path, value)?, None)
    } else {
        let mut previous = None;
        let mut edits = Vec::with_capacity(found.len());
        for key in &found {
            let (content, old) = rewrite_scalar(&lines, key, path, value)?;
            if previous.is_none() {
                previous = old;
            }
            edits.push((key.line, content));
        }
        (rebuild(&lines, &edits), previous)
    };

    verify(&text, &segments, path, value)?;

    let changed = text != source;
    debug!(changed, documents = found.len(), ?previous, "field set");
    Ok(FieldEdit {
        text,
        previous,
        changed,
    })
}

/// Read the scalar at dotted `path` from the first document that has it.
pub fn get_field(source: &str, path: &str) -> YamlResult<Option<String>> {
    let segments: Vec<&str> = path.split('.').collect();
    Ok(parse_documents(source)?
        .iter()
        .find_map(|doc| lookup(doc, &segments)))
}

// ──────────────────────────────────────────────
// Line model
// ──────────────────────────────────────────────

/// One physical line, split into content and terminator.
struct Line<'a> {
    content: &'a str,
    ending: &'a str,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    source
        .split_inclusive('\n')
        .map(|chunk| {
            let content = chunk.trim_end_matches(['\n', '\r']);
            Line {
                content,
                ending: &chunk[content.len()..],
            }
        })
        .collect()
}

fn indent_of(content: &str) -> (usize, &str) {
    let trimmed = content.trim_start_matches(' ');
    (content.len() - trimmed.len(), trimmed)
}

fn is_document_marker(trimmed: &str) -> bool {
    trimmed == "---" || trimmed.starts_with("--- ") || trimmed == "..."
}

fn strip_sequence_dash(rest: &str) -> Option<&str> {
    if rest == "-" {
        Some("")
    } else {
        rest.strip_prefix("- ")
    }
}

/// A mapping key found while walking the document.
#[derive(Debug, Clone, Copy)]
struct KeyLine {
    line: usize,
    indent: usize,
    /// Byte offset in the line just past the `:` separator.
    value_start: usize,
}

/// Find the first block-mapping key whose full path equals `path`.
fn locate(lines: &[Line<'_>], path: &[&str]) -> Option<KeyLine> {
    locate_all(lines, path).into_iter().next()
}

/// Every block-mapping key whose full path equals `path`, at most one per document.
fn locate_all(lines: &[Line<'_>], path: &[&str]) -> Vec<KeyLine> {
    let mut found = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut block_scalar: Option<usize> = None;

    for (idx, line) in lines.iter().enumerate() {
        let content = line.content;
        let (indent, trimmed) = indent_of(content);

        if let Some(owner) = block_scalar {
            if trimmed.trim().is_empty() || indent > owner {
                continue;
            }
            block_scalar = None;
        }
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if is_document_marker(trimmed) {
            stack.clear();
            continue;
        }

        // `- key: value` opens a mapping inside a sequence item
        let mut col = indent;
        let mut rest = trimmed;
        while let Some(after) = strip_sequence_dash(rest) {
            while stack.last().is_some_and(|(i, _)| *i >= col) {
                stack.pop();
            }
            stack.push((col, "-".to_string()));
            let inner = after.trim_start_matches(' ');
            col += rest.len() - inner.len();
            rest = inner;
        }

        let Some((key, after_colon)) = split_key(rest) else {
            continue;
        };
        while stack.last().is_some_and(|(i, _)| *i >= col) {
            stack.pop();
        }
        stack.push((col, key));

        let value = after_colon.trim_start();
        if value.starts_with('|') || value.starts_with('>') {
            block_scalar = Some(col);
        }

        if stack.len() == path.len() && stack.iter().zip(path).all(|((_, k), p)| k == p) {
            found.push(KeyLine {
                line: idx,
                indent: col,
                value_start: content.len() - after_colon.len(),
            });
        }
    }
    found
}

/// Split `key: rest` into the unquoted key and everything after the colon.
fn split_key(s: &str) -> Option<(String, &str)> {
    let first = s.chars().next()?;

    if first == '"' || first == '\'' {
        let close = closing_quote(s, first)?;
        let rest = s[close + 1..].strip_prefix(':')?;
        if !(rest.is_empty() || rest.starts_with([' ', '\t'])) {
            return None;
        }
        return Some((unquote(&s[..=close], first), rest));
    }

    if matches!(
        first,
        '[' | '{' | '#' | '&' | '*' | '!' | '|' | '>' | '%' | '@' | '`' | '?'
    ) {
        return None;
    }

    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && i > 0 && matches!(bytes[i - 1], b' ' | b'\t') {
            return None;
        }
        if b == b':' && matches!(bytes.get(i + 1), None | Some(b' ' | b'\t')) {
            let key = s[..i].trim_end();
            if key.is_empty() {
                return None;
            }
            return Some((key.to_string(), &s[i + 1..]));
        }
    }
    None
}

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteStyle {
    Plain,
    Single,
    Double,
}

#[derive(Debug)]
struct ScalarSpan {
    start: usize,
    end: usize,
    style: QuoteStyle,
    value: String,
}

#[derive(Debug)]
enum ValueSlot {
    /// An inline scalar occupying `start..end` of the line.
    Scalar(ScalarSpan),
    /// Nothing after the colon except whitespace or a comment.
    Empty,
    /// Flow collection, block scalar, alias, or multi-line quoted scalar.
    Complex,
}

fn scalar_slot(content: &str, value_start: usize) -> ValueSlot {
    let tail = &content[value_start..];
    let mut start = value_start + (tail.len() - tail.trim_start().len());

    // Skip node properties: `&anchor`, `!!str`
    while content[start..].starts_with(['&', '!']) {
        let rest = &content[start..];
        let token_end = rest.find([' ', '\t']).unwrap_or(rest.len());
        let after = &rest[token_end..];
        start += token_end + (after.len() - after.trim_start().len());
        if start == value_start + tail.len() {
            return ValueSlot::Complex;
        }
    }

    let rest = &content[start..];
    match rest.chars().next() {
        None | Some('#') => ValueSlot::Empty,
        Some('|' | '>' | '[' | '{' | '*') => ValueSlot::Complex,
        Some(q @ ('"' | '\'')) => match closing_quote(rest, q) {
            Some(close) => ValueSlot::Scalar(ScalarSpan {
                start,
                end: start + close + 1,
                style: if q == '"' {
                    QuoteStyle::Double
                } else {
                    QuoteStyle::Single
                },
                value: unquote(&rest[..=close], q),
            }),
            None => ValueSlot::Complex,
        },
        Some(_) => {
            let end = plain_end(rest);
            ValueSlot::Scalar(ScalarSpan {
                start,
                end: start + end,
                style: QuoteStyle::Plain,
                value: rest[..end].to_string(),
            })
        }
    }
}

/// Length of a plain scalar, stopping at a ` #` comment and trailing blanks.
fn plain_end(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let cut = (1..bytes.len())
        .find(|&i| bytes[i] == b'#' && matches!(bytes[i - 1], b' ' | b'\t'))
        .unwrap_or(bytes.len());
    rest[..cut].trim_end().len()
}

/// Byte index of the quote closing the scalar that opens `s`.
fn closing_quote(s: &str, quote: char) -> Option<usize> {
    let bytes = s.as_bytes();
    let q = quote as u8;
    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if quote == '"' && b == b'\\' {
            i += 2;
            continue;
        }
        if b == q {
            if quote == '\'' && bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn unquote(quoted: &str, quote: char) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    if quote == '\'' {
        inner.replace("''", "'")
    } else {
        inner.replace("\\\"", "\"").replace("\\\\", "\\")
    }
}

fn render(value: &str, style: QuoteStyle) -> String {
    match style {
        QuoteStyle::Plain if !needs_quotes(value) => value.to_string(),
        QuoteStyle::Single => format!("'{}'", value.replace('\'', "''")),
        QuoteStyle::Plain | QuoteStyle::Double => {
            format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
        }
    }
}

/// Whether a plain scalar would be read back as something other than this string.
fn needs_quotes(value: &str) -> bool {
    if value.is_empty() || value.parse::<f64>().is_ok() {
        return true;
    }
    if matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
    ) {
        return true;
    }
    value.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@` ".contains(c))
        || value.ends_with(' ')
        || value.contains(": ")
        || value.contains(" #")
}

// ──────────────────────────────────────────────
// Edits
// ──────────────────────────────────────────────

fn has_children(lines: &[Line<'_>], line: usize, indent: usize) -> bool {
    for next in &lines[line + 1..] {
        let (next_indent, trimmed) = indent_of(next.content);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return next_indent > indent
            || (next_indent == indent && strip_sequence_dash(trimmed).is_some());
    }
    false
}

/// New content for the line holding `found`, and the value it replaces.
fn rewrite_scalar(
    lines: &[Line<'_>],
    found: &KeyLine,
    path: &str,
    value: &str,
) -> YamlResult<(String, Option<String>)> {
    let content = lines[found.line].content;
    let (head, tail) = content.split_at(found.value_start);
    let tail_is_blank = tail.trim().is_empty() || tail.trim_start().starts_with('#');

    let (new_content, previous) = match scalar_slot(content, found.value_start) {
        ValueSlot::Scalar(span) => (
            format!(
                "{}{}{}",
                &content[..span.start],
                render(value, span.style),
                &content[span.end..]
            ),
            Some(span.value),
        ),
        ValueSlot::Empty if tail_is_blank && !has_children(lines, found.line, found.indent) => (
            format!("{head} {}{tail}", render(value, QuoteStyle::Plain)),
            None,
        ),
        _ => {
            return Err(YamlError::NotAScalar {
                path: path.to_string(),
            });
        }
    };

    Ok((new_content, previous))
}

/// Reassemble the document with some lines' content replaced.
fn rebuild(lines: &[Line<'_>], edits: &[(usize, String)]) -> String {
    let mut text = String::new();
    for (idx, line) in lines.iter().enumerate() {
        let content = edits
            .iter()
            .find(|(line, _)| *line == idx)
            .map_or(line.content, |(_, content)| content.as_str());
        text.push_str(content);
        text.push_str(line.ending);
    }
    text
}

fn insert_path(
    source: &str,
    lines: &[Line<'_>],
    segments: &[&str],
    path: &str,
    value: &str,
) -> YamlResult<String> {
    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };

    for depth in (1..segments.len()).rev() {
        let Some(parent) = locate(lines, &segments[..depth]) else {
            continue;
        };
        let not_a_mapping = || YamlError::NotAMapping {
            path: path.to_string(),
            parent: segments[..depth].join("."),
        };

        if !matches!(
            scalar_slot(lines[parent.line].content, parent.value_start),
            ValueSlot::Empty
        ) {
            return Err(not_a_mapping());
        }

        let extent = block_extent(lines, &parent).ok_or_else(not_a_mapping)?;
        let child_indent = extent.child_indent.unwrap_or(parent.indent + 2);
        let unit = (child_indent - parent.indent).max(1);
        let new_lines = render_new_keys(&segments[depth..], child_indent, unit, value);

        let mut text = String::new();
        for (idx, line) in lines.iter().enumerate() {
            text.push_str(line.content);
            text.push_str(line.ending);
            if idx == extent.last {
                if line.ending.is_empty() {
                    text.push_str(newline);
                }
                for new_line in &new_lines {
                    text.push_str(new_line);
                    text.push_str(newline);
                }
            }
        }
        return Ok(text);
    }

    let mut text = source.to_string();
    if !text.is_empty() && !text.ends_with('\n') {
        text.push_str(newline);
    }
    for new_line in render_new_keys(segments, 0, 2, value) {
        text.push_str(&new_line);
        text.push_str(newline);
    }
    Ok(text)
}

struct BlockExtent {
    /// Indentation of the first child line, if the block has any.
    child_indent: Option<usize>,
    /// Index of the last line that belongs to the block.
    last: usize,
}

/// Measure the block owned by `parent`. Returns `None` if its children form a sequence.
fn block_extent(lines: &[Line<'_>], parent: &KeyLine) -> Option<BlockExtent> {
    let mut extent = BlockExtent {
        child_indent: None,
        last: parent.line,
    };

    for (idx, line) in lines.iter().enumerate().skip(parent.line + 1) {
        let (indent, trimmed) = indent_of(line.content);
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            if indent > parent.indent {
                extent.last = idx;
            }
            continue;
        }
        if indent <= parent.indent {
            if extent.child_indent.is_none()
                && indent == parent.indent
                && strip_sequence_dash(trimmed).is_some()
            {
                return None;
            }
            break;
        }
        if extent.child_indent.is_none() {
            if strip_sequence_dash(trimmed).is_some() {
                return None;
            }
            extent.child_indent = Some(indent);
        }
        extent.last = idx;
    }
    Some(extent)
}

fn render_new_keys(segments: &[&str], indent: usize, unit: usize, value: &str) -> Vec<String> {
    segments
        .iter()
        .enumerate()
        .map(|(depth, segment)| {
            let pad = " ".repeat(indent + depth * unit);
            if depth + 1 == segments.len() {
                format!("{pad}{segment}: {}", render(value, QuoteStyle::Plain))
            } else {
                format!("{pad}{segment}:")
            }
        })
        .collect()
}

// ──────────────────────────────────────────────
// Verification
// ──────────────────────────────────────────────

fn parse_documents(text: &str) -> YamlResult<Vec<Value>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_saphyr::from_multiple::<Value>(text).map_err(|e| YamlError::Parse(e.to_string()))
}

fn lookup(doc: &Value, segments: &[&str]) -> Option<String> {
    let node = segments
        .iter()
        .try_fold(doc, |node, segment| node.get(*segment))?;
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Every document holding the field must read back `expected`, and at least one must hold it.
fn verify(text: &str, segments: &[&str], path: &str, expected: &str) -> YamlResult<()> {
    let values: Vec<String> = parse_documents(text)?
        .iter()
        .filter_map(|doc| lookup(doc, segments))
        .collect();
    match values.iter().find(|v| v.as_str() != expected) {
        None if !values.is_empty() => Ok(()),
        stale => Err(YamlError::Verify {
            path: path.to_string(),
            expected: expected.to_string(),
            found: stale.cloned(),
        }),
    }
}
