//! `keystone config`: print the resolved configuration.

use anyhow::Result;
use keystone_config::ShowFormat;

use crate::context::CliContext;
use crate::formatter::OutputFormat;

pub(crate) fn run_config(ctx: &CliContext) -> Result<()> {
    let format = match ctx.format {
        OutputFormat::Json => ShowFormat::Json,
        OutputFormat::Pretty => ShowFormat::Toml,
    };
    print!("{}", ctx.resolved.render(format)?);
    if format == ShowFormat::Json {
        println!();
    }
    Ok(())
}
