//! The result of a layered load, and rendering it for display.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};
use crate::types::Config;

/// Output format for [`ResolvedConfig::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    /// TOML, with a trailing comment listing each field's source layer.
    #[default]
    Toml,
    /// JSON object with `config`, `sources`, and `loaded_files` keys.
    Json,
}

/// A configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final, validated configuration.
    pub config: Config,
    /// Dotted field path to the layer that last set it.
    pub field_sources: FieldSources,
    /// Config files that were found and merged, in load order.
    pub loaded_files: Vec<String>,
}

#[derive(Serialize)]
struct JsonView<'a> {
    config: &'a Config,
    sources: std::collections::BTreeMap<&'a str, &'a ConfigLayer>,
    loaded_files: &'a [String],
}

impl ResolvedConfig {
    /// The layer that set `field` (a dotted path such as `thresholds.block`).
    #[must_use]
    pub fn source_of(&self, field: &str) -> Option<&ConfigLayer> {
        self.field_sources.get(field)
    }

    /// Render the configuration for display.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RenderError`] if serialization fails.
    pub fn render(&self, format: ShowFormat) -> ConfigResult<String> {
        let mut sorted: Vec<(&str, &ConfigLayer)> = self
            .field_sources
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        match format {
            ShowFormat::Toml => {
                let mut out = toml::to_string_pretty(&self.config)
                    .map_err(|e| ConfigError::RenderError(e.to_string()))?;
                out.push_str("\n# Sources\n");
                for file in &self.loaded_files {
                    let _ = writeln!(out, "# loaded: {file}");
                }
                for (field, layer) in sorted.iter().filter(|(_, l)| **l != ConfigLayer::Defaults) {
                    let _ = writeln!(out, "# {field} <- {layer}");
                }
                Ok(out)
            },
            ShowFormat::Json => {
                let view = JsonView {
                    config: &self.config,
                    sources: sorted.into_iter().collect(),
                    loaded_files: &self.loaded_files,
                };
                serde_json::to_string_pretty(&view)
                    .map_err(|e| ConfigError::RenderError(e.to_string()))
            },
        }
    }
}
