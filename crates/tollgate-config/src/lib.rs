#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for the tollgate approval engine.
//!
//! This crate provides a single [`Config`] type covering pattern sets, risk
//! weights, decision thresholds, batch and session limits, audit retention,
//! and logging.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tollgate_config::Config;
//!
//! // Defaults → user → workspace → env.
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("block threshold: {}", resolved.config.thresholds.block);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.tollgate/config.toml`): can only *tighten*
//! 2. **User** (`~/.tollgate/config.toml`, or `$TOLLGATE_HOME/config.toml`)
//! 3. **Environment variables** (`TOLLGATE_*`): fallback only
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other tollgate crates**. The engine
//! compiles these plain types into its runtime settings.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with precedence.
pub mod merge;
/// Resolved configuration display and serialization.
pub mod show;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::ConfigLayer;
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with an explicit tollgate home directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        home_dir: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(home_dir))
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse configuration from a TOML string. Missing keys take their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the string cannot be parsed or the
    /// result fails validation.
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_owned(),
            source: e,
        })?;
        validate::validate(&config)?;
        Ok(config)
    }
}
