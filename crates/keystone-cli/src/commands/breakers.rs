//! `keystone breakers`: circuit breaker status for every plugin.

use anyhow::Result;
use colored::Colorize;
use keystone_core::BreakerStatus;

use crate::context::CliContext;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

pub(crate) fn run_breakers(ctx: &CliContext) -> Result<()> {
    let mut runtime = ctx.boot()?;
    let statuses = runtime.all_status();

    if ctx.format == OutputFormat::Json {
        return print_json(&statuses);
    }

    let config = runtime.breaker_config();
    println!("{}", Theme::header("Circuit breakers"));
    println!(
        "{}",
        Theme::dimmed(&format!(
            "trip after {} failures in {} ms, cool down {} ms",
            config.failure_threshold,
            config.failure_window.as_millis(),
            config.cool_down.as_millis()
        ))
    );
    println!("{}", Theme::separator());
    for status in &statuses {
        print_breaker(status);
    }
    Ok(())
}

pub(crate) fn print_breaker(status: &BreakerStatus) {
    print!(
        "  {:<20} {:<10} failures={}",
        status.plugin_id.as_str().bold(),
        Theme::breaker(status.state),
        status.failure_count
    );
    if let Some(retry) = status.next_retry_time {
        print!("  retry at {}", retry.format("%H:%M:%S%.3f"));
    }
    println!(
        "  {}",
        Theme::dimmed(&format!(
            "ok={} failed={} rejected={}",
            status.total_successes, status.total_failures, status.rejected_calls
        ))
    );
}
