//! The resolved configuration and how it is displayed.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources};
use crate::types::Config;

/// Output of [`crate::loader::load`].
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The merged, validated configuration.
    pub config: Config,
    /// Which layer set each field.
    pub field_sources: FieldSources,
    /// Config files that were read, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Rendering used by `keystone config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    /// TOML with a trailing comment naming each field's source.
    #[default]
    Toml,
    /// Plain JSON of the configuration.
    Json,
}

#[derive(Serialize)]
struct JsonView<'a> {
    config: &'a Config,
    loaded_files: &'a [String],
}

impl ResolvedConfig {
    /// Layer that set `field`. Fields never recorded fall back to defaults.
    #[must_use]
    pub fn source_of(&self, field: &str) -> ConfigLayer {
        self.field_sources
            .get(field)
            .copied()
            .unwrap_or(ConfigLayer::Defaults)
    }

    /// Render the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::SerializeError`] if serialization fails.
    pub fn render(&self, format: ShowFormat) -> ConfigResult<String> {
        match format {
            ShowFormat::Json => serde_json::to_string_pretty(&JsonView {
                config: &self.config,
                loaded_files: &self.loaded_files,
            })
            .map_err(|e| ConfigError::SerializeError(e.to_string())),
            ShowFormat::Toml => self.render_annotated(),
        }
    }

    fn render_annotated(&self) -> ConfigResult<String> {
        let value = toml::Value::try_from(&self.config)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        let mut out = String::new();
        for file in &self.loaded_files {
            let _ = writeln!(out, "# loaded: {file}");
        }

        let Some(root) = value.as_table() else {
            return Ok(out);
        };
        for (section, fields) in root {
            let _ = writeln!(out, "\n[{section}]");
            let Some(fields) = fields.as_table() else {
                continue;
            };
            for (key, field) in fields {
                let path = format!("{section}.{key}");
                let _ = writeln!(out, "{key} = {field}  # {}", self.source_of(&path));
            }
        }
        Ok(out)
    }
}
