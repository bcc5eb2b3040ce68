//! Shared state for every command: resolved config, output format, and how
//! to boot a runtime from the configured manifest file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use keystone_config::ResolvedConfig;
use keystone_core::{Clock, PluginManifest, SystemClock};
use keystone_plugins::PluginRuntime;
use tracing::warn;

use crate::config_bridge;
use crate::formatter::OutputFormat;
use crate::manifest_source;
use crate::theme::Theme;

pub(crate) struct CliContext {
    pub(crate) resolved: ResolvedConfig,
    pub(crate) format: OutputFormat,
    /// `--manifests` override for `plugins.manifest_path`.
    pub(crate) manifest_override: Option<PathBuf>,
}

impl CliContext {
    pub(crate) fn manifest_path(&self) -> PathBuf {
        self.manifest_override
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.resolved.config.plugins.manifest_path))
    }

    /// Manifests from the manifest file with `plugins.disabled` applied.
    pub(crate) fn manifests(&self) -> Result<Vec<PluginManifest>> {
        let path = self.manifest_path();
        let mut manifests = manifest_source::load_manifests(&path)?;
        let unknown =
            manifest_source::apply_disabled(&mut manifests, &self.resolved.config.plugins.disabled);
        for id in unknown {
            warn!(plugin_id = %id, "plugins.disabled names a plugin that is not in the manifest file");
        }
        Ok(manifests)
    }

    /// Boot a runtime on the system clock.
    pub(crate) fn boot(&self) -> Result<PluginRuntime> {
        self.boot_with_clock(Arc::new(SystemClock))
    }

    /// Boot a runtime on `clock`. Rejected manifests are reported and skipped.
    pub(crate) fn boot_with_clock(&self, clock: Arc<dyn Clock>) -> Result<PluginRuntime> {
        let manifests = self.manifests()?;
        let config = config_bridge::breaker_config(&self.resolved.config.breaker);
        let (runtime, rejected) = PluginRuntime::boot(config, clock, manifests);
        for err in &rejected {
            if self.format == OutputFormat::Pretty {
                eprintln!("{}", Theme::warning(&format!("skipped manifest: {err}")));
            }
            warn!(error = %err, "Manifest rejected");
        }
        Ok(runtime)
    }

    pub(crate) fn manifest_path_display(&self) -> String {
        self.manifest_path().display().to_string()
    }
}
