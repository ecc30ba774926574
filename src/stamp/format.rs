// ABOUTME: Renders version metadata into the text of a tracked file.
// ABOUTME: Pure string transformation; file I/O lives in the stamper.

use serde_json::Value;

use crate::config::{StampFileConfig, StampKeys, VersionFileFormat};

use super::VersionMetadata;

/// Produce the stamped contents of `original` for the given file config.
pub fn render(
    file: &StampFileConfig,
    original: &str,
    metadata: &VersionMetadata,
) -> Result<String, String> {
    let keys = file.keys();
    match file.format {
        VersionFileFormat::Plain => Ok(format!("{}\n", metadata.version)),
        VersionFileFormat::Json => render_json(original, &keys, metadata),
        VersionFileFormat::Assignments => render_assignments(original, &keys, metadata),
    }
}

fn replacements(keys: &StampKeys, metadata: &VersionMetadata) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(3);
    if let Some(key) = &keys.version {
        pairs.push((key.clone(), metadata.version.to_string()));
    }
    if let Some(key) = &keys.build_timestamp {
        pairs.push((key.clone(), metadata.timestamp_string()));
    }
    if let Some(key) = &keys.commit {
        pairs.push((key.clone(), metadata.commit_id.to_string()));
    }
    pairs
}

fn render_json(
    original: &str,
    keys: &StampKeys,
    metadata: &VersionMetadata,
) -> Result<String, String> {
    let mut doc: Value =
        serde_json::from_str(original).map_err(|e| format!("not valid JSON: {e}"))?;
    let object = doc
        .as_object_mut()
        .ok_or_else(|| "top-level JSON value is not an object".to_string())?;

    for (key, value) in replacements(keys, metadata) {
        object.insert(key, Value::String(value));
    }

    let mut out =
        serde_json::to_string_pretty(&doc).map_err(|e| format!("failed to encode JSON: {e}"))?;
    out.push('\n');
    Ok(out)
}

fn render_assignments(
    original: &str,
    keys: &StampKeys,
    metadata: &VersionMetadata,
) -> Result<String, String> {
    let pairs = replacements(keys, metadata);
    let mut seen = vec![false; pairs.len()];
    let mut out = String::with_capacity(original.len() + 64);

    for line in original.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let rewritten = pairs
            .iter()
            .enumerate()
            .find_map(|(i, (key, value))| {
                rewrite_assignment(body, key, value).map(|new_line| (i, new_line))
            });

        match rewritten {
            Some((i, new_line)) => {
                seen[i] = true;
                out.push_str(&new_line);
            }
            None => out.push_str(body),
        }
        out.push_str(ending);
    }

    if let Some(i) = seen.iter().position(|found| !found) {
        return Err(format!("key '{}' not found", pairs[i].0));
    }
    Ok(out)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Rewrite `<prefix> KEY <sep> <value><rest>` if the last token before the
/// first `=` or `:` is `key` (optionally quoted).
///
/// Only the value changes. A quoted value keeps its quotes and everything after
/// the closing quote; an unquoted value ends at whitespace, `;` or `,`.
fn rewrite_assignment(line: &str, key: &str, value: &str) -> Option<String> {
    let sep = line.find(['=', ':'])?;
    let (lhs, rest) = line.split_at(sep);
    let token = lhs.split_whitespace().last()?;
    if token.trim_matches(|c: char| c == '"' || c == '\'') != key {
        return None;
    }

    // `==` is a comparison, not an assignment.
    if rest[1..].starts_with('=') {
        return None;
    }

    let literal = rest[1..].trim_start();
    let head = &line[..line.len() - literal.len()];
    let (start, end) = match literal.chars().next() {
        Some(q @ ('"' | '\'')) => (1, 1 + literal[1..].find(q)?),
        _ => (
            0,
            literal
                .find(|c: char| c.is_whitespace() || c == ';' || c == ',')
                .unwrap_or(literal.len()),
        ),
    };

    Some(format!(
        "{head}{}{value}{}",
        &literal[..start],
        &literal[end..]
    ))
}
