use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Which configuration layer a value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLayer {
    /// Compiled-in defaults (`defaults.toml`).
    Defaults,
    /// User-level configuration (`~/.tollgate/config.toml`).
    User,
    /// Workspace-level configuration (`{workspace}/.tollgate/config.toml`).
    Workspace,
    /// Environment variable fallback.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user (~/.tollgate/config.toml)"),
            Self::Workspace => write!(f, "workspace (.tollgate/config.toml)"),
            Self::Environment => write!(f, "environment variable"),
        }
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;
