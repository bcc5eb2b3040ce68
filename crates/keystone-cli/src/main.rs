//! Keystone CLI - inspect and exercise the plugin runtime.
//!
//! Loads layered configuration and a TOML manifest file, boots the runtime,
//! and reports plugin status, the dependency graph and breaker state.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keystone_config::{Config, ResolvedConfig};

mod commands;
mod config_bridge;
mod context;
mod formatter;
mod manifest_source;
mod theme;

use commands::simulate::Step;
use commands::{breakers, check, config, graph, plugins, simulate};
use context::CliContext;
use formatter::OutputFormat;

/// Keystone - plugin dependency and fault management
#[derive(Parser)]
#[command(name = "keystone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the user and workspace
    /// files; `KEYSTONE_*` fallbacks still apply
    #[arg(short, long, global = true, env = "KEYSTONE_CONFIG")]
    config: Option<PathBuf>,

    /// Plugin manifest file (overrides plugins.manifest_path)
    #[arg(short, long, global = true)]
    manifests: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List plugins with their status
    Plugins,

    /// Show the dependency graph by layer
    Graph,

    /// Show circuit breaker status
    Breakers,

    /// Validate config and manifests; exits non-zero if unhealthy
    Check,

    /// Replay steps on a manual clock: toggle:ID fail:ID call:ID reset:ID wait:MS
    Simulate {
        /// Steps to run in order
        #[arg(required = true)]
        steps: Vec<Step>,
    },

    /// Print the resolved configuration and where each value came from
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<ResolvedConfig> {
    if let Some(path) = path {
        return Config::load_explicit(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }

    let workspace_root = std::env::current_dir().ok();
    Config::load(workspace_root.as_deref()).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let resolved = load_config(cli.config.as_ref())?;

    let log_config = config_bridge::log_config(&resolved.config, cli.verbose);
    if let Err(e) = keystone_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let ctx = CliContext {
        resolved,
        format: cli.format,
        manifest_override: cli.manifests,
    };

    match cli.command {
        Commands::Plugins => plugins::run_plugins(&ctx)?,
        Commands::Graph => graph::run_graph(&ctx)?,
        Commands::Breakers => breakers::run_breakers(&ctx)?,
        Commands::Check => {
            if !check::run_check(&ctx)? {
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Simulate { steps } => simulate::run_simulate(&ctx, &steps).await?,
        Commands::Config => config::run_config(&ctx)?,
    }

    Ok(ExitCode::SUCCESS)
}
