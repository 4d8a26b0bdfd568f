//! Declarative projection of nested tracker records into flat display records.
//!
//! A [`FieldMap`] pairs display names with [`PathExpr`]s. Path expressions
//! cover the subset of JMESPath the field maps use:
//!
//! - `fields.summary` – nested object lookup
//! - `fields."customfield-1"` – quoted identifiers
//! - `fields.fixVersions[0]` – array index, negative indices count from the end
//! - `fields.components[*].name` – wildcard projection over an array
//! - `fields.sprints[]` – flatten one level, then project
//!
//! Evaluation never fails: a missing key, a type mismatch or an out of range
//! index all yield `None`, rendered as `null`.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(i64),
    Wildcard,
    Flatten,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PathExpr {
    source: String,
    steps: Vec<Step>,
}

impl PathExpr {
    pub(crate) fn parse(source: &str) -> Result<Self, String> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err("path expression must not be empty".to_string());
        }
        let chars: Vec<char> = trimmed.chars().collect();
        let mut steps = Vec::new();
        let mut pos = 0;
        let mut expect_segment = true;

        while pos < chars.len() {
            let c = chars[pos];
            if c == '[' {
                let close = chars[pos..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| format!("unclosed '[' in {:?}", trimmed))?;
                let inner: String = chars[pos + 1..close].iter().collect();
                let inner = inner.trim();
                steps.push(match inner {
                    "" => Step::Flatten,
                    "*" => Step::Wildcard,
                    number => Step::Index(number.parse::<i64>().map_err(|_| {
                        format!("invalid index [{}] in {:?}", number, trimmed)
                    })?),
                });
                pos = close + 1;
                expect_segment = false;
                continue;
            }
            if c == '.' {
                if expect_segment {
                    return Err(format!("unexpected '.' at {} in {:?}", pos, trimmed));
                }
                pos += 1;
                expect_segment = true;
                if pos == chars.len() {
                    return Err(format!("trailing '.' in {:?}", trimmed));
                }
                continue;
            }
            if !expect_segment {
                return Err(format!(
                    "expected '.' or '[' at {} in {:?}",
                    pos, trimmed
                ));
            }
            if c == '"' {
                let mut name = String::new();
                pos += 1;
                loop {
                    match chars.get(pos) {
                        None => return Err(format!("unclosed quote in {:?}", trimmed)),
                        Some('"') => break,
                        Some('\\') if chars.get(pos + 1).is_some() => {
                            name.push(chars[pos + 1]);
                            pos += 2;
                        }
                        Some(&ch) => {
                            name.push(ch);
                            pos += 1;
                        }
                    }
                }
                pos += 1;
                steps.push(Step::Field(name));
            } else if c.is_alphanumeric() || c == '_' {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                steps.push(Step::Field(chars[start..pos].iter().collect()));
            } else {
                return Err(format!(
                    "unexpected character {:?} at {} in {:?}",
                    c, pos, trimmed
                ));
            }
            expect_segment = false;
        }

        Ok(Self {
            source: trimmed.to_string(),
            steps,
        })
    }

    pub(crate) fn search(&self, record: &Value) -> Option<Value> {
        evaluate(&self.steps, record)
    }
}

fn evaluate(steps: &[Step], value: &Value) -> Option<Value> {
    let Some((step, rest)) = steps.split_first() else {
        return match value {
            Value::Null => None,
            other => Some(other.clone()),
        };
    };
    match step {
        Step::Field(name) => evaluate(rest, value.as_object()?.get(name)?),
        Step::Index(index) => {
            let items = value.as_array()?;
            let resolved = if *index < 0 {
                items.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                *index as usize
            };
            evaluate(rest, items.get(resolved)?)
        }
        Step::Wildcard => {
            let items = value.as_array()?;
            Some(Value::Array(
                items.iter().filter_map(|item| evaluate(rest, item)).collect(),
            ))
        }
        Step::Flatten => {
            let items = value.as_array()?;
            let mut flat = Vec::new();
            for item in items {
                match item {
                    Value::Array(inner) => flat.extend(inner.iter().cloned()),
                    other => flat.push(other.clone()),
                }
            }
            Some(Value::Array(
                flat.iter().filter_map(|item| evaluate(rest, item)).collect(),
            ))
        }
    }
}

/// Ordered field name to path expression table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FieldMap {
    fields: Vec<(String, PathExpr)>,
}

impl FieldMap {
    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut map = Self::default();
        for (name, source) in pairs {
            let name = name.into();
            let expr = PathExpr::parse(source.as_ref())
                .map_err(|err| format!("field_map.{}: {}", name, err))?;
            map.insert(name, expr);
        }
        Ok(map)
    }

    /// Fields shown for every comment of an issue.
    pub(crate) fn comment_map() -> Self {
        Self::from_pairs([
            ("id", "id"),
            ("author", "author.displayName"),
            ("body", "body"),
            ("created", "created"),
            ("updated", "updated"),
        ])
        .unwrap_or_default()
    }

    fn insert(&mut self, name: String, expr: PathExpr) {
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = expr,
            None => self.fields.push((name, expr)),
        }
    }

    pub(crate) fn without(&self, excluded: &[&str]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| !excluded.contains(&name.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(existing, _)| existing == name)
    }

    pub(crate) fn project(&self, record: &Value) -> Record {
        let mut projected = Record::default();
        for (name, expr) in &self.fields {
            projected.push(name.clone(), expr.search(record).unwrap_or(Value::Null));
        }
        projected
    }
}

impl<'de> Deserialize<'de> for FieldMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldMapVisitor;

        impl<'de> Visitor<'de> for FieldMapVisitor {
            type Value = FieldMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of field names to path expressions")
            }

            fn visit_map<A>(self, mut access: A) -> Result<FieldMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs: Vec<(String, String)> = Vec::new();
                while let Some((name, source)) = access.next_entry::<String, String>()? {
                    pairs.push((name, source));
                }
                FieldMap::from_pairs(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor)
    }
}

/// A flat, ordered record ready for YAML or JSON rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub(crate) fn push(&mut self, name: String, value: Value) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    #[cfg(test)]
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Non-null entries as a JSON object, for create payloads.
    pub(crate) fn into_fields(self) -> serde_json::Map<String, Value> {
        self.entries
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Projects an issue and appends its browse URL. The URL is composed from the
/// server and the projected `key`, so it is not expressible as a path.
pub(crate) fn project_issue(map: &FieldMap, issue: &Value, server: &str) -> Record {
    let mut record = map.project(issue);
    let url = match record.get("key") {
        Some(Value::String(key)) => Value::String(browse_url(server, key)),
        _ => Value::Null,
    };
    record.push("url".to_string(), url);
    record
}

pub(crate) fn browse_url(server: &str, key: &str) -> String {
    format!("{}/browse/{}", server.trim_end_matches('/'), key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_issue() -> Value {
        json!({
            "key": "X-1",
            "fields": {
                "summary": "hello",
                "labels": ["sdk", "performance"],
                "customfield_10020": [
                    {"id": 7, "name": "Sprint 7"},
                    {"id": 8, "name": "Sprint 8"}
                ],
                "fixVersions": [{"name": "3.10.0"}, {"name": "3.11.0"}],
                "custom-field": "dashed",
                "nested": [[1, 2], [3]],
                "assignee": null
            }
        })
    }

    #[test]
    fn projects_key_summary_and_url() {
        let map = FieldMap::from_pairs([("key", "key"), ("summary", "fields.summary")])
            .expect("field map");
        let record = project_issue(
            &map,
            &json!({"key": "X-1", "fields": {"summary": "hello"}}),
            "https://tracker.example.com",
        );
        assert_eq!(
            serde_json::to_value(&record).expect("serialize"),
            json!({
                "key": "X-1",
                "summary": "hello",
                "url": "https://tracker.example.com/browse/X-1"
            })
        );
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["key", "summary", "url"]);
    }

    #[test]
    fn missing_paths_project_to_null() {
        let map = FieldMap::from_pairs([
            ("missing", "fields.nope.deeper"),
            ("assignee", "fields.assignee.displayName"),
            ("wrong_type", "fields.summary[0]"),
        ])
        .expect("field map");
        let record = map.project(&sample_issue());
        assert_eq!(record.get("missing"), Some(&Value::Null));
        assert_eq!(record.get("assignee"), Some(&Value::Null));
        assert_eq!(record.get("wrong_type"), Some(&Value::Null));
    }

    #[test]
    fn url_is_null_without_a_key() {
        let map = FieldMap::from_pairs([("summary", "fields.summary")]).expect("field map");
        let record = project_issue(&map, &sample_issue(), "https://t");
        assert_eq!(record.get("url"), Some(&Value::Null));
    }

    #[test]
    fn wildcard_index_and_flatten_steps() {
        let issue = sample_issue();
        let search = |source: &str| PathExpr::parse(source).expect("parse").search(&issue);
        assert_eq!(
            search("fields.customfield_10020[*].name"),
            Some(json!(["Sprint 7", "Sprint 8"]))
        );
        assert_eq!(search("fields.fixVersions[-1].name"), Some(json!("3.11.0")));
        assert_eq!(search("fields.fixVersions[5].name"), None);
        assert_eq!(search("fields.nested[]"), Some(json!([1, 2, 3])));
        assert_eq!(search("fields.\"custom-field\""), Some(json!("dashed")));
        assert_eq!(search("fields.labels"), Some(json!(["sdk", "performance"])));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for source in ["", "fields.", ".key", "fields[abc]", "fields[0", "a b", "\"open"] {
            assert!(
                PathExpr::parse(source).is_err(),
                "expected {source:?} to be rejected"
            );
        }
    }

    #[test]
    fn field_map_keeps_declaration_order_from_yaml() {
        let map: FieldMap = serde_yaml::from_str(
            "summary: fields.summary\nkey: key\nstatus: fields.status.name\n",
        )
        .expect("parse field map");
        let record = map.project(&sample_issue());
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["summary", "key", "status"]);
    }

    #[test]
    fn field_map_reports_the_bad_entry() {
        let err = serde_yaml::from_str::<FieldMap>("key: key\nsummary: \"fields.\"\n")
            .expect_err("bad expression");
        assert!(err.to_string().contains("field_map.summary"), "got: {err}");
    }

    #[test]
    fn without_drops_named_fields() {
        let map = FieldMap::from_pairs([
            ("key", "key"),
            ("summary", "fields.summary"),
            ("status", "fields.status.name"),
        ])
        .expect("field map")
        .without(&["key", "status"]);
        assert!(map.contains("summary"));
        assert!(!map.contains("key"));
        assert!(!map.contains("status"));
    }

    #[test]
    fn comment_map_projects_the_five_comment_fields() {
        let record = FieldMap::comment_map().project(&json!({
            "id": "100",
            "author": {"displayName": "Ada"},
            "body": "looks good",
            "created": "2024-01-01T00:00:00.000+0000",
            "updated": "2024-01-02T00:00:00.000+0000"
        }));
        let names: Vec<&str> = record.names().collect();
        assert_eq!(names, vec!["id", "author", "body", "created", "updated"]);
        assert_eq!(record.get("author"), Some(&json!("Ada")));
    }
}
