//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.tollgate/config.toml` (or `$TOLLGATE_HOME/config.toml`)
//! 3. Merge `{workspace}/.tollgate/config.toml` + restriction enforcement
//! 4. Apply env var fallbacks for fields still at their defaults
//! 5. Deserialize merged tree → `Config`
//! 6. Validate
//! 7. Return `ResolvedConfig`

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{
    ConfigLayer, FieldSources, deep_merge_tracking, enforce_restrictions, record_leaves,
};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Directory name used for user and workspace config.
const CONFIG_DIR: &str = ".tollgate";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the root of the project the agent operates in. If
/// `None`, the workspace layer is skipped.
///
/// `home_override` is treated as the tollgate home directory itself
/// (the directory holding `config.toml`), bypassing discovery and
/// `TOLLGATE_HOME`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();

    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", &ConfigLayer::Defaults, &mut field_sources);

    // 2. User config.
    let user_path = match home_override {
        Some(h) => Some(h.join("config.toml")),
        None => match env_vars.get("TOLLGATE_HOME") {
            Some(dir) if Path::new(dir).is_dir() => Some(PathBuf::from(dir).join("config.toml")),
            Some(dir) => {
                warn!(path = %dir, "TOLLGATE_HOME is not a directory; ignoring");
                home_directory().ok().map(|h| h.join(CONFIG_DIR).join("config.toml"))
            },
            None => match home_directory() {
                Ok(h) => Some(h.join(CONFIG_DIR).join("config.toml")),
                Err(e) => {
                    debug!(error = %e, "no home directory; skipping user config");
                    None
                },
            },
        },
    };

    if let Some(path) = user_path
        && let Some(overlay) = try_load_file(&path)?
    {
        deep_merge_tracking(
            &mut merged,
            &overlay,
            "",
            &ConfigLayer::User,
            &mut field_sources,
        );
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded user config");
    }

    // 3. Workspace config. The merged tree before this layer is the baseline
    //    the workspace may only tighten.
    if let Some(ws_root) = workspace_root {
        let ws_path = ws_root.join(CONFIG_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            let baseline = merged.clone();
            deep_merge_tracking(
                &mut merged,
                &overlay,
                "",
                &ConfigLayer::Workspace,
                &mut field_sources,
            );
            enforce_restrictions(&mut merged, &baseline, &overlay);

            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    // 4. Env fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &mut field_sources, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    // 5. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering, no env).
///
/// Keys missing from the file take their built-in defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let Some(value) = try_load_file(path)? else {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    };

    let config: Config = value
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
///
/// Reads once, then checks the size, so there is no window between a
/// metadata check and the read.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, body: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_with_empty_home() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load(None, Some(home.path())).unwrap();

        assert_eq!(resolved.config.thresholds, Config::default().thresholds);
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.source_of("thresholds.block"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_user_layer_overrides_defaults() {
        let home = tempfile::tempdir().unwrap();
        write(
            home.path(),
            "config.toml",
            "[thresholds]\nblock = 0.9\n[session]\nmax_duration_secs = 7200",
        );

        let resolved = load(None, Some(home.path())).unwrap();
        assert!((resolved.config.thresholds.block - 0.9).abs() < f64::EPSILON);
        assert_eq!(resolved.config.session.max_duration_secs, 7200);
        assert_eq!(
            resolved.source_of("thresholds.block"),
            Some(&ConfigLayer::User)
        );
        assert_eq!(resolved.loaded_files.len(), 1);
    }

    #[test]
    fn test_workspace_layer_only_tightens() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        write(
            ws.path(),
            ".tollgate/config.toml",
            r#"
            [thresholds]
            block = 0.95
            contextual = 0.5

            [patterns]
            allow_commands = ["ls", "curl"]
            extra_deny_signatures = ["terraform destroy"]
        "#,
        );

        let config = load(Some(ws.path()), Some(home.path())).unwrap().config;
        assert!((config.thresholds.block - 0.8).abs() < f64::EPSILON);
        assert!((config.thresholds.contextual - 0.5).abs() < f64::EPSILON);
        assert_eq!(
            config.patterns.allow_commands,
            Config::default().patterns.allow_commands
        );
        assert_eq!(
            config.patterns.extra_deny_signatures,
            vec!["terraform destroy".to_owned()]
        );
    }

    #[test]
    fn test_workspace_layer_cannot_loosen_risk() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        write(
            ws.path(),
            ".tollgate/config.toml",
            r"
            [risk]
            factors = []
            dangerous_increment = 0.0

            [risk.context]
            critical_path = -1.0
        ",
        );

        let config = load(Some(ws.path()), Some(home.path())).unwrap().config;
        let defaults = Config::default();
        assert_eq!(config.risk.factors, defaults.risk.factors);
        assert!((config.risk.dangerous_increment - 0.8).abs() < f64::EPSILON);
        assert!((config.risk.context.critical_path - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[thresholds]\nauto_approve = 0.7");

        let err = load(None, Some(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let home = tempfile::tempdir().unwrap();
        write(home.path(), "config.toml", "[thresholds\nblock = ");

        let err = load(None, Some(home.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tollgate.toml", "[logging]\nlevel = \"debug\"");

        let config = load_file(&dir.path().join("tollgate.toml")).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.session, Config::default().session);
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/tollgate.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
