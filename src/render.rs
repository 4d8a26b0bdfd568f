//! Plain-text output: aligned columns and (optionally coloured) YAML dumps.

use serde::Serialize;
use serde_json::Value;

use crate::errors::ShellError;

const KEY_COLOR: &str = "\x1b[38;5;33m";
const VALUE_COLOR: &str = "\x1b[38;5;172m";
const RESET: &str = "\x1b[0m";

/// Left-aligned columns separated by two spaces, trailing blanks trimmed.
pub(crate) fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (index, cell) in row.iter().enumerate() {
            if index > 0 {
                line.push_str("  ");
            }
            line.push_str(cell);
            let pad = widths[index].saturating_sub(cell.chars().count());
            line.extend(std::iter::repeat(' ').take(pad));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub(crate) fn yaml<T: Serialize>(value: &T) -> Result<String, ShellError> {
    serde_yaml::to_string(value).map_err(|err| ShellError::Render {
        what: "YAML",
        message: err.to_string(),
    })
}

pub(crate) fn json<T: Serialize>(value: &T) -> Result<String, ShellError> {
    serde_json::to_string_pretty(value)
        .map(|mut text| {
            text.push('\n');
            text
        })
        .map_err(|err| ShellError::Render {
            what: "JSON",
            message: err.to_string(),
        })
}

/// Colours top-level and nested mapping keys and scalar values with 256-colour
/// ANSI escapes. Block scalars and list markers pass through untouched.
pub(crate) fn highlight_yaml(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for line in text.lines() {
        let indent_len = line.len() - line.trim_start().len();
        let (indent, body) = line.split_at(indent_len);
        let (marker, body) = match body.strip_prefix("- ") {
            Some(rest) => ("- ", rest),
            None => ("", body),
        };
        match split_key(body) {
            Some((key, value)) => {
                out.push_str(indent);
                out.push_str(marker);
                out.push_str(KEY_COLOR);
                out.push_str(key);
                out.push_str(RESET);
                out.push(':');
                if !value.is_empty() {
                    out.push(' ');
                    out.push_str(VALUE_COLOR);
                    out.push_str(value);
                    out.push_str(RESET);
                }
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn split_key(body: &str) -> Option<(&str, &str)> {
    if body.starts_with('\'') || body.starts_with('"') || body.starts_with('#') {
        return None;
    }
    let (key, value) = body.split_once(':')?;
    if key.is_empty() || !(value.is_empty() || value.starts_with(' ')) {
        return None;
    }
    Some((key, value.trim_start()))
}

/// Joins a JSON array of strings (or of objects with a `name`) with commas.
pub(crate) fn join_names(value: Option<&Value>) -> String {
    let Some(Value::Array(items)) = value else {
        return String::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn scalar(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_aligns_columns() {
        let rendered = table(&[
            vec!["0".to_string(), "APP-1".to_string(), "Fix login".to_string()],
            vec!["10".to_string(), "APP-12".to_string(), "".to_string()],
        ]);
        assert_eq!(rendered, "0   APP-1   Fix login\n10  APP-12\n");
    }

    #[test]
    fn empty_table_is_empty() {
        assert_eq!(table(&[]), "");
    }

    #[test]
    fn highlight_colours_keys_and_values() {
        let rendered = highlight_yaml("key: X-1\nfields:\n  - name: a\nplain text\n");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], format!("{KEY_COLOR}key{RESET}: {VALUE_COLOR}X-1{RESET}"));
        assert_eq!(lines[1], format!("{KEY_COLOR}fields{RESET}:"));
        assert_eq!(
            lines[2],
            format!("  - {KEY_COLOR}name{RESET}: {VALUE_COLOR}a{RESET}")
        );
        assert_eq!(lines[3], "plain text");
    }

    #[test]
    fn urls_in_values_are_not_split_as_keys() {
        let rendered = highlight_yaml("url: https://t/browse/X-1\n");
        assert!(rendered.contains(&format!("{VALUE_COLOR}https://t/browse/X-1{RESET}")));
    }

    #[test]
    fn join_names_handles_strings_and_named_objects() {
        assert_eq!(join_names(Some(&json!(["sdk", "perf"]))), "sdk,perf");
        assert_eq!(
            join_names(Some(&json!([{"name": "Sprint 7"}, {"id": 1}]))),
            "Sprint 7"
        );
        assert_eq!(join_names(None), "");
        assert_eq!(join_names(Some(&json!(null))), "");
    }

    #[test]
    fn scalars_render_without_quotes() {
        assert_eq!(scalar(Some(&json!("3.11.0"))), "3.11.0");
        assert_eq!(scalar(Some(&json!(3))), "3");
        assert_eq!(scalar(Some(&json!(null))), "");
    }
}
