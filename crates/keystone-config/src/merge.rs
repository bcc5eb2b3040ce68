//! Layered merging of raw TOML trees.
//!
//! Merging works on [`toml::Value`] rather than deserialized structs so a key
//! missing from a layer never overrides a lower layer. Tables merge per key;
//! scalars and arrays replace.

use std::collections::HashMap;
use std::fmt;

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// Compiled-in `defaults.toml`.
    Defaults,
    /// `~/.keystone/config.toml` or `$KEYSTONE_HOME/config.toml`.
    User,
    /// `{workspace}/.keystone/config.toml`.
    Workspace,
    /// A file named explicitly, replacing the user and workspace files.
    Explicit,
    /// A `KEYSTONE_*` environment variable.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => f.write_str("defaults"),
            Self::User => f.write_str("user (~/.keystone/config.toml)"),
            Self::Workspace => f.write_str("workspace (.keystone/config.toml)"),
            Self::Explicit => f.write_str("explicit file"),
            Self::Environment => f.write_str("environment variable"),
        }
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Merge `overlay` into `base`, recording in `sources` which leaves `layer`
/// set.
pub fn merge_layer(
    base: &mut toml::Value,
    overlay: &toml::Value,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    merge_at(base, overlay, "", layer, sources);
}

fn merge_at(
    base: &mut toml::Value,
    overlay: &toml::Value,
    path: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) = (&mut *base, overlay) {
        for (key, value) in overlay_table {
            let child_path = join(path, key);
            match base_table.get_mut(key) {
                Some(existing) => merge_at(existing, value, &child_path, layer, sources),
                None => {
                    base_table.insert(key.clone(), value.clone());
                    record_leaves(value, &child_path, layer, sources);
                },
            }
        }
        return;
    }

    *base = overlay.clone();
    record_leaves(overlay, path, layer, sources);
}

fn record_leaves(value: &toml::Value, path: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                record_leaves(child, &join(path, key), layer, sources);
            }
        },
        _ => {
            sources.insert(path.to_owned(), layer);
        },
    }
}

/// Set the value at a dotted path, creating intermediate tables.
///
/// Returns `false` if a non-table value sits where a table is needed.
pub fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return false;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return false;
        };
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    }

    match current.as_table_mut() {
        Some(table) => {
            table.insert(leaf.to_owned(), value);
            true
        },
        None => false,
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
