//! `keystone plugins`: list registered plugins and their status.

use anyhow::Result;
use colored::Colorize;
use keystone_core::RuntimePlugin;

use crate::context::CliContext;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

pub(crate) fn run_plugins(ctx: &CliContext) -> Result<()> {
    let runtime = ctx.boot()?;
    let snapshot = runtime.snapshot();

    if ctx.format == OutputFormat::Json {
        return print_json(&*snapshot);
    }

    println!(
        "{} {}",
        Theme::header("Plugins"),
        Theme::dimmed(&format!("({})", ctx.manifest_path_display()))
    );
    println!("{}", Theme::separator());
    for plugin in &snapshot.plugins {
        print_plugin(plugin);
    }
    Ok(())
}

pub(crate) fn print_plugin(plugin: &RuntimePlugin) {
    let toggle = if plugin.enabled_by_user { "on" } else { "off" };
    print!(
        "  {:<20} {:<18} {}",
        plugin.id().as_str().bold(),
        Theme::status(plugin.status),
        Theme::dimmed(toggle)
    );
    if let Some(reason) = &plugin.reason {
        print!("  {}", Theme::dimmed(&format!("({reason})")));
    }
    println!();

    if !plugin.manifest.provides.is_empty() {
        println!("      provides: {}", join(&plugin.manifest.provides));
    }
    if !plugin.manifest.requires.is_empty() {
        println!("      requires: {}", join(&plugin.manifest.requires));
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
