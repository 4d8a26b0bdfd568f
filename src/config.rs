use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::projection::FieldMap;

const SECRET_ENV_PREFIX: &str = "env:";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) tracker: TrackerSettings,
    #[serde(default)]
    pub(crate) limits: Limits,
    #[serde(default)]
    pub(crate) users: BTreeMap<String, String>,
    pub(crate) field_map: FieldMap,
    #[serde(default)]
    pub(crate) transitions: BTreeMap<String, String>,
    pub(crate) ci: CiSettings,
    #[serde(default)]
    pub(crate) log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackerSettings {
    pub(crate) server: String,
    pub(crate) username: String,
    pub(crate) token: String,
    pub(crate) default_project: String,
    #[serde(default = "default_sprint_field")]
    pub(crate) sprint_field: String,
    #[serde(default = "default_epic_name_field")]
    pub(crate) epic_name_field: String,
    #[serde(default = "default_sprint_name_format")]
    pub(crate) sprint_name_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct Limits {
    #[serde(default = "default_search_limit")]
    pub(crate) search: u32,
    #[serde(default = "default_sprint_limit")]
    pub(crate) sprint: u32,
    #[serde(default = "default_release_limit")]
    pub(crate) release: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            search: default_search_limit(),
            sprint: default_sprint_limit(),
            release: default_release_limit(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CiSettings {
    #[serde(default = "default_ci_server")]
    pub(crate) server: String,
    pub(crate) token: String,
    pub(crate) project: String,
}

fn default_sprint_field() -> String {
    "customfield_10020".to_string()
}

fn default_epic_name_field() -> String {
    "customfield_10018".to_string()
}

fn default_sprint_name_format() -> String {
    "Week %W".to_string()
}

fn default_search_limit() -> u32 {
    10
}

fn default_sprint_limit() -> u32 {
    500
}

fn default_release_limit() -> u32 {
    500
}

fn default_ci_server() -> String {
    "https://gitlab.com".to_string()
}

#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) warnings: Vec<String>,
}

pub(crate) fn load_config(path: &Path) -> Result<LoadedConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let mut warnings = unknown_top_level_keys(&mapping);
    emit_unknown_key_warnings(&warnings);
    for key in &warnings {
        mapping.remove(key.as_str());
    }
    validate_required_fields(&mapping)?;

    let mut config: Config = serde_path_to_error::deserialize(Value::Mapping(mapping))
        .map_err(|err| {
            format!(
                "Failed to parse config {}: {}: {}",
                path.display(),
                err.path(),
                err.inner()
            )
        })?;

    config.tracker.token = resolve_secret(&config.tracker.token, "tracker.token")?;
    config.ci.token = resolve_secret(&config.ci.token, "ci.token")?;
    config.log_path = config.log_path.map(|log_path| expand_home(&log_path));

    if !config.field_map.contains("key") {
        let warning = "Warning: field_map has no `key` entry; issue URLs will be null".to_string();
        eprintln!("{}", warning);
        warnings.push(warning);
    }

    Ok(LoadedConfig { config, warnings })
}

/// `env:NAME` reads the secret from the environment; anything else is literal.
fn resolve_secret(value: &str, label: &str) -> Result<String, String> {
    let Some(name) = value.strip_prefix(SECRET_ENV_PREFIX) else {
        return Ok(value.to_string());
    };
    match env::var(name.trim()) {
        Ok(secret) if !secret.trim().is_empty() => Ok(secret),
        Ok(_) => Err(format!(
            "{} refers to environment variable {} which is empty",
            label,
            name.trim()
        )),
        Err(_) => Err(format!(
            "{} refers to environment variable {} which is not set",
            label,
            name.trim()
        )),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn emit_unknown_key_warnings(keys: &[String]) {
    for key in keys {
        eprintln!("Warning: unknown config key: {}", key);
    }
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    let allowed = [
        "tracker",
        "limits",
        "users",
        "field_map",
        "transitions",
        "ci",
        "log_path",
    ];

    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !allowed.contains(&key.as_str()))
        .collect()
}

fn validate_required_fields(mapping: &Mapping) -> Result<(), String> {
    let tracker = require_mapping(mapping, "tracker", "tracker")?;
    require_non_empty_string(tracker, "server", "tracker.server")?;
    require_non_empty_string(tracker, "username", "tracker.username")?;
    require_non_empty_string(tracker, "token", "tracker.token")?;
    require_non_empty_string(tracker, "default_project", "tracker.default_project")?;

    let field_map = require_mapping(mapping, "field_map", "field_map")?;
    if field_map.is_empty() {
        return Err("field_map must not be empty".to_string());
    }

    let ci = require_mapping(mapping, "ci", "ci")?;
    require_non_empty_string(ci, "token", "ci.token")?;
    require_non_empty_string(ci, "project", "ci.project")?;

    Ok(())
}

fn require_mapping<'a>(
    mapping: &'a Mapping,
    key_name: &str,
    label: &str,
) -> Result<&'a Mapping, String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Err(format!("Missing required config value: {}", label)),
        Some(Value::Null) => Err(format!("{} must not be null", label)),
        Some(Value::Mapping(value)) => Ok(value),
        Some(_) => Err(format!("{} must be a mapping", label)),
    }
}

fn require_non_empty_string(mapping: &Mapping, key_name: &str, label: &str) -> Result<(), String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None => Err(format!("Missing required config value: {}", label)),
        Some(Value::Null) => Err(format!("{} must not be null", label)),
        Some(Value::String(value)) => {
            if value.trim().is_empty() {
                Err(format!("{} must not be empty", label))
            } else {
                Ok(())
            }
        }
        Some(_) => Err(format!("{} must be a string", label)),
    }
}
