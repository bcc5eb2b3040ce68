//! Reads plugin manifests from a TOML file of `[[plugin]]` tables.

use std::path::Path;

use anyhow::{Context, Result};
use keystone_core::PluginManifest;
use serde::Deserialize;

/// Largest manifest file accepted (1 MiB).
const MAX_MANIFEST_FILE_SIZE: u64 = 1_048_576;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    plugin: Vec<PluginManifest>,
}

/// Parse manifests from TOML text, in file order.
pub(crate) fn parse_manifests(text: &str) -> Result<Vec<PluginManifest>> {
    let file: ManifestFile = toml::from_str(text).context("invalid plugin manifest file")?;
    Ok(file.plugin)
}

/// Read and parse a manifest file.
pub(crate) fn load_manifests(path: &Path) -> Result<Vec<PluginManifest>> {
    let read_error = || format!("failed to read plugin manifests from {}", path.display());
    let size = std::fs::metadata(path).with_context(read_error)?.len();
    if size > MAX_MANIFEST_FILE_SIZE {
        anyhow::bail!(
            "{} is {size} bytes, exceeding the {MAX_MANIFEST_FILE_SIZE} byte limit",
            path.display()
        );
    }
    let text = std::fs::read_to_string(path).with_context(read_error)?;
    parse_manifests(&text).with_context(|| path.display().to_string())
}

/// Force the listed plugins to start disabled.
///
/// Returns the ids in `disabled` that match no manifest.
pub(crate) fn apply_disabled(manifests: &mut [PluginManifest], disabled: &[String]) -> Vec<String> {
    let mut unknown = Vec::new();
    for id in disabled {
        let mut matched = false;
        for manifest in manifests.iter_mut().filter(|m| m.id.as_str() == id) {
            manifest.enabled = false;
            matched = true;
        }
        if !matched {
            unknown.push(id.clone());
        }
    }
    unknown
}
