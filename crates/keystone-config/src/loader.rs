//! Config file discovery and layered loading.
//!
//! `load` runs these steps:
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge `~/.keystone/config.toml`, or `$KEYSTONE_HOME/config.toml` when
//!    the former is missing
//! 3. Merge `{workspace}/.keystone/config.toml`
//! 4. Fill unset fields from `KEYSTONE_*` variables
//! 5. Deserialize and validate
//!
//! `load_explicit` replaces steps 2 and 3 with a single named file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, merge_layer};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Largest config file accepted (1 MiB).
pub const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Name of the per-user and per-workspace config directory.
const CONFIG_DIR: &str = ".keystone";
const CONFIG_FILE: &str = "config.toml";

/// Load configuration from every layer, reading `KEYSTONE_*` variables from
/// the process environment.
///
/// `workspace_root` enables the workspace layer. `keystone_home_override`
/// names a directory that replaces `~/.keystone` for the user layer.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a config file cannot be read or parsed, or
/// if the merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    keystone_home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    load_with_env(workspace_root, keystone_home_override, &collect_env_vars())
}

/// Same as [`load`] with an explicit environment.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(
    workspace_root: Option<&Path>,
    keystone_home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let (mut merged, mut field_sources) = defaults_layer()?;
    let mut loaded_files = Vec::new();

    if let Some((overlay, path)) = load_user_layer(keystone_home_override, env_vars)? {
        merge_layer(&mut merged, &overlay, ConfigLayer::User, &mut field_sources);
        info!(path = %path.display(), "Loaded user config");
        loaded_files.push(path.display().to_string());
    }

    if let Some(root) = workspace_root {
        let path = root.join(CONFIG_DIR).join(CONFIG_FILE);
        if let Some(overlay) = try_load_file(&path)? {
            merge_layer(&mut merged, &overlay, ConfigLayer::Workspace, &mut field_sources);
            info!(path = %path.display(), "Loaded workspace config");
            loaded_files.push(path.display().to_string());
        }
    }

    resolve(merged, field_sources, loaded_files, env_vars)
}

/// Load the defaults, then `path` in place of the user and workspace files,
/// then the `KEYSTONE_*` fallbacks from the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if `path` is missing, too large or malformed, or
/// if the merged configuration fails validation.
pub fn load_explicit(path: &Path) -> ConfigResult<ResolvedConfig> {
    load_explicit_with_env(path, &collect_env_vars())
}

/// Same as [`load_explicit`] with an explicit environment.
///
/// # Errors
///
/// See [`load_explicit`].
pub fn load_explicit_with_env(
    path: &Path,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let Some(overlay) = try_load_file(path)? else {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    };

    let (mut merged, mut field_sources) = defaults_layer()?;
    merge_layer(&mut merged, &overlay, ConfigLayer::Explicit, &mut field_sources);
    info!(path = %path.display(), "Loaded config file");

    resolve(merged, field_sources, vec![path.display().to_string()], env_vars)
}

fn defaults_layer() -> ConfigResult<(toml::Value, FieldSources)> {
    let defaults: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut merged = toml::Value::Table(toml::Table::new());
    let mut field_sources = FieldSources::new();
    merge_layer(&mut merged, &defaults, ConfigLayer::Defaults, &mut field_sources);
    Ok((merged, field_sources))
}

/// Apply env fallbacks, deserialize and validate.
fn resolve(
    mut merged: toml::Value,
    mut field_sources: FieldSources,
    loaded_files: Vec<String>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let applied = apply_env_fallbacks(&mut merged, &mut field_sources, env_vars);
    if applied > 0 {
        debug!(count = applied, "Applied environment fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a single config file with no layering.
///
/// Fields the file omits take their defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, too large, malformed, or
/// fails validation.
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

fn load_user_layer(
    keystone_home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<Option<(toml::Value, PathBuf)>> {
    if let Some(dir) = keystone_home_override {
        let path = dir.join(CONFIG_FILE);
        return Ok(try_load_file(&path)?.map(|overlay| (overlay, path)));
    }

    let path = home_directory()?.join(CONFIG_DIR).join(CONFIG_FILE);
    if let Some(overlay) = try_load_file(&path)? {
        return Ok(Some((overlay, path)));
    }

    let Some(raw) = env_vars.get("KEYSTONE_HOME") else {
        return Ok(None);
    };
    let dir = PathBuf::from(raw);
    if !dir.is_dir() {
        warn!(path = %raw, "KEYSTONE_HOME is not a directory, ignoring");
        return Ok(None);
    }
    let path = dir.join(CONFIG_FILE);
    Ok(try_load_file(&path)?.map(|overlay| (overlay, path)))
}

/// Read and parse a TOML file. A missing file is `Ok(None)`.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let read_error = |e: std::io::Error| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    };
    let size = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, skipping");
            return Ok(None);
        },
        Err(e) => return Err(read_error(e)),
    };
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {size} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(read_error)?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
}

fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}
