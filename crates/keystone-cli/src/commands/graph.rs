//! `keystone graph`: show the dependency graph by layer.

use std::collections::BTreeMap;

use anyhow::Result;
use colored::Colorize;
use keystone_core::PluginId;

use crate::context::CliContext;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

pub(crate) fn run_graph(ctx: &CliContext) -> Result<()> {
    let runtime = ctx.boot()?;
    let data = runtime.graph_data();

    if ctx.format == OutputFormat::Json {
        return print_json(&data);
    }

    let mut layers: BTreeMap<u32, Vec<&PluginId>> = BTreeMap::new();
    let mut unlayered = Vec::new();
    for node in &data.nodes {
        match node.layer {
            Some(layer) => layers.entry(layer).or_default().push(&node.plugin_id),
            None => unlayered.push(&node.plugin_id),
        }
    }

    println!("{}", Theme::header("Dependency graph"));
    println!("{}", Theme::separator());
    for (layer, ids) in &layers {
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        println!("  layer {layer}: {}", names.join(", "));
    }
    if !unlayered.is_empty() {
        let names: Vec<&str> = unlayered.iter().map(|id| id.as_str()).collect();
        println!("  {} {}", "cyclic:".red().bold(), names.join(", "));
    }

    if !data.edges.is_empty() {
        println!("\n{}", Theme::header("Edges"));
        for edge in &data.edges {
            println!(
                "  {} {} {} {}",
                edge.from,
                "→".dimmed(),
                edge.to,
                Theme::dimmed(&format!("[{}]", edge.capability))
            );
        }
    }

    let graph = runtime.graph();
    let mut header_printed = false;
    for node in &data.nodes {
        for capability in graph.unresolved(&node.plugin_id) {
            if !header_printed {
                println!("\n{}", Theme::header("Unresolved"));
                header_printed = true;
            }
            let line = format!("{} needs '{capability}'", node.plugin_id);
            println!("  {}", Theme::warning(&line));
        }
    }
    Ok(())
}
