//! `keystone check`: validate config and manifests and summarise health.

use anyhow::Result;
use colored::Colorize;
use keystone_core::PluginStatus;
use serde_json::json;

use crate::context::CliContext;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// Returns `Ok(false)` when the runtime booted but is not healthy.
pub(crate) fn run_check(ctx: &CliContext) -> Result<bool> {
    let mut runtime = ctx.boot()?;
    let health = runtime.health();
    let problems: Vec<_> = runtime
        .get_all()
        .into_iter()
        .filter(|p| matches!(p.status, PluginStatus::PausedDependency | PluginStatus::Error))
        .collect();

    if ctx.format == OutputFormat::Json {
        print_json(&json!({
            "healthy": health.is_healthy(),
            "config_files": ctx.resolved.loaded_files,
            "manifest_path": ctx.manifest_path_display(),
            "plugins": health.plugins,
            "active": health.active,
            "disabled": health.disabled,
            "paused": health.paused,
            "error": health.error,
            "breakers": {
                "closed": health.breakers_closed,
                "open": health.breakers_open,
                "half_open": health.breakers_half_open,
            },
            "problems": problems,
        }))?;
        return Ok(health.is_healthy());
    }

    println!("{}", "Keystone Check".cyan().bold());
    println!();
    if ctx.resolved.loaded_files.is_empty() {
        println!("  config:    {}", Theme::dimmed("built-in defaults"));
    }
    for file in &ctx.resolved.loaded_files {
        println!("  config:    {file}");
    }
    println!("  manifests: {}", ctx.manifest_path_display());
    println!();
    println!(
        "  plugins {}  active {}  disabled {}  paused {}  error {}",
        health.plugins,
        health.active.to_string().green(),
        health.disabled.to_string().dimmed(),
        health.paused.to_string().yellow(),
        health.error.to_string().red()
    );
    println!(
        "  breakers closed {}  open {}  half-open {}",
        health.breakers_closed, health.breakers_open, health.breakers_half_open
    );

    for plugin in &problems {
        let reason = plugin
            .reason
            .as_ref()
            .map_or_else(String::new, |r| format!(": {r}"));
        println!(
            "  {}",
            Theme::warning(&format!("{} is {}{reason}", plugin.id(), plugin.status))
        );
    }

    println!();
    if health.is_healthy() {
        println!("{}", Theme::success("All enabled plugins are active"));
    } else {
        println!("{}", Theme::error("Some enabled plugins are not active"));
    }
    Ok(health.is_healthy())
}
