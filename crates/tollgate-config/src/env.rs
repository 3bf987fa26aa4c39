//! Environment variable fallbacks.
//!
//! Environment variables sit *below* every config file: they only fill a
//! field whose value still comes from the embedded defaults (or is absent
//! entirely). A value set in a user or workspace file always wins.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::merge::{ConfigLayer, FieldSources};

/// Prefix shared by every recognised variable.
const ENV_PREFIX: &str = "TOLLGATE_";

/// How an environment variable's string value maps onto a TOML value.
#[derive(Debug, Clone, Copy)]
enum EnvKind {
    Str,
    Int,
}

/// `(variable, dotted config path, kind)`.
const ENV_MAPPINGS: &[(&str, &str, EnvKind)] = &[
    ("TOLLGATE_LOG_LEVEL", "logging.level", EnvKind::Str),
    ("TOLLGATE_LOG_FORMAT", "logging.format", EnvKind::Str),
    (
        "TOLLGATE_SESSION_DURATION_SECS",
        "session.default_duration_secs",
        EnvKind::Int,
    ),
    ("TOLLGATE_AUDIT_PATH", "audit.path", EnvKind::Str),
];

/// Snapshot the `TOLLGATE_*` variables from the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply environment fallbacks to `merged`, returning how many were used.
///
/// A mapping applies when the target field is missing or was last set by
/// the defaults layer. Values that fail to parse are skipped with a warning.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied: usize = 0;

    for (var, path, kind) in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(*var) else {
            continue;
        };

        let overridable = sources
            .get(*path)
            .is_none_or(|layer| *layer == ConfigLayer::Defaults);
        if !overridable {
            debug!(var, path, "config file sets field; ignoring env fallback");
            continue;
        }

        let value = match kind {
            EnvKind::Str => toml::Value::String(raw.clone()),
            EnvKind::Int => match raw.trim().parse::<i64>() {
                Ok(n) => toml::Value::Integer(n),
                Err(e) => {
                    warn!(var, value = %raw, error = %e, "ignoring non-integer env var");
                    continue;
                },
            },
        };

        let segments: Vec<&str> = path.split('.').collect();
        if insert_path(merged, &segments, value) {
            sources.insert((*path).to_owned(), ConfigLayer::Environment);
            applied = applied.saturating_add(1);
        }
    }

    applied
}

/// Insert a value at a dotted path, creating missing tables on the way.
fn insert_path(root: &mut toml::Value, segments: &[&str], value: toml::Value) -> bool {
    let Some((leaf, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        current = table
            .entry((*segment).to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    match current.as_table_mut() {
        Some(table) => {
            table.insert((*leaf).to_owned(), value);
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_fills_default_field() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"info\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::Defaults);

        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("TOLLGATE_LOG_LEVEL", "debug")]),
        );

        assert_eq!(count, 1);
        assert_eq!(merged["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(
            sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_does_not_override_file_value() {
        let mut merged: toml::Value = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        let mut sources = FieldSources::new();
        sources.insert("logging.level".to_owned(), ConfigLayer::User);

        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("TOLLGATE_LOG_LEVEL", "trace")]),
        );

        assert_eq!(count, 0);
        assert_eq!(merged["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_env_creates_missing_field() {
        let mut merged: toml::Value = toml::from_str("[audit]\ncapacity = 10").unwrap();
        let mut sources = FieldSources::new();

        apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("TOLLGATE_AUDIT_PATH", "/tmp/audit.jsonl")]),
        );

        assert_eq!(merged["audit"]["path"].as_str(), Some("/tmp/audit.jsonl"));
    }

    #[test]
    fn test_env_integer_parse_failure_skipped() {
        let mut merged: toml::Value =
            toml::from_str("[session]\ndefault_duration_secs = 3600").unwrap();
        let mut sources = FieldSources::new();

        let count = apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("TOLLGATE_SESSION_DURATION_SECS", "soon")]),
        );

        assert_eq!(count, 0);
        assert_eq!(
            merged["session"]["default_duration_secs"].as_integer(),
            Some(3600)
        );
    }

    #[test]
    fn test_env_integer_parsed() {
        let mut merged: toml::Value =
            toml::from_str("[session]\ndefault_duration_secs = 3600").unwrap();
        let mut sources = FieldSources::new();

        apply_env_fallbacks(
            &mut merged,
            &mut sources,
            &vars(&[("TOLLGATE_SESSION_DURATION_SECS", " 600 ")]),
        );

        assert_eq!(
            merged["session"]["default_duration_secs"].as_integer(),
            Some(600)
        );
    }
}
