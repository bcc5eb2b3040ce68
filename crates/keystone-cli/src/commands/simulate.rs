//! `keystone simulate`: replay toggles, failures and calls against the
//! configured plugin set on a manual clock and print what changed.
//!
//! Steps:
//! - `toggle:ID` flips the user's on/off switch
//! - `fail:ID` records a failure against the breaker
//! - `call:ID` calls the plugin through the execution guard
//! - `reset:ID` forces the breaker closed
//! - `wait:MS` advances the clock

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use keystone_core::{
    BreakerState, BreakerStatus, Clock, ManualClock, PluginId, PluginStatus, RegistrySnapshot,
    StatusReason, SystemClock,
};
use keystone_plugins::{ExecutionGuard, InvocationError, PluginInvoker, SharedRuntime};
use serde::Serialize;

use crate::context::CliContext;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// One simulation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Toggle(PluginId),
    Fail(PluginId),
    Call(PluginId),
    Reset(PluginId),
    Wait(u64),
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, arg) = s
            .split_once(':')
            .ok_or_else(|| format!("expected VERB:ARG, got '{s}'"))?;

        if verb == "wait" {
            return arg
                .parse()
                .map(Self::Wait)
                .map_err(|_| format!("wait expects milliseconds, got '{arg}'"));
        }

        let id = PluginId::new(arg).map_err(|e| e.to_string())?;
        match verb {
            "toggle" => Ok(Self::Toggle(id)),
            "fail" => Ok(Self::Fail(id)),
            "call" => Ok(Self::Call(id)),
            "reset" => Ok(Self::Reset(id)),
            other => Err(format!(
                "unknown step '{other}'; expected toggle, fail, call, reset or wait"
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggle(id) => write!(f, "toggle:{id}"),
            Self::Fail(id) => write!(f, "fail:{id}"),
            Self::Call(id) => write!(f, "call:{id}"),
            Self::Reset(id) => write!(f, "reset:{id}"),
            Self::Wait(ms) => write!(f, "wait:{ms}"),
        }
    }
}

/// Answers every call with the arguments it was given.
struct EchoInvoker;

#[async_trait]
impl PluginInvoker for EchoInvoker {
    async fn call(
        &self,
        _plugin_id: &PluginId,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, InvocationError> {
        Ok(args)
    }
}

#[derive(Debug, Serialize)]
struct StatusChange {
    plugin_id: PluginId,
    from: PluginStatus,
    to: PluginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<StatusReason>,
}

#[derive(Debug, Serialize)]
struct BreakerChange {
    plugin_id: PluginId,
    from: BreakerState,
    to: BreakerState,
}

#[derive(Debug, Serialize)]
struct StepReport {
    step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    status_changes: Vec<StatusChange>,
    breaker_changes: Vec<BreakerChange>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    steps: Vec<StepReport>,
    final_snapshot: RegistrySnapshot,
}

pub(crate) async fn run_simulate(ctx: &CliContext, steps: &[Step]) -> Result<()> {
    let clock = Arc::new(ManualClock::new(SystemClock.now()));
    let runtime = ctx
        .boot_with_clock(Arc::clone(&clock) as Arc<dyn Clock>)?
        .into_shared();
    let guard = ExecutionGuard::new(Arc::clone(&runtime), Arc::new(EchoInvoker));

    let mut reports = Vec::with_capacity(steps.len());
    for step in steps {
        let (before, before_breakers) = capture(&runtime).await;
        let error = apply(step, &runtime, &guard, &clock).await.err();
        let (after, after_breakers) = capture(&runtime).await;

        let report = StepReport {
            step: step.to_string(),
            error,
            status_changes: status_changes(&before, &after),
            breaker_changes: breaker_changes(&before_breakers, &after_breakers),
        };
        if ctx.format == OutputFormat::Pretty {
            print_step(&report);
        }
        reports.push(report);
    }

    let final_snapshot = (*runtime.lock().await.snapshot()).clone();
    if ctx.format == OutputFormat::Json {
        return print_json(&SimulationReport {
            steps: reports,
            final_snapshot,
        });
    }

    println!("{}", Theme::separator());
    for plugin in &final_snapshot.plugins {
        crate::commands::plugins::print_plugin(plugin);
    }
    Ok(())
}

async fn capture(runtime: &SharedRuntime) -> (Arc<RegistrySnapshot>, Vec<BreakerStatus>) {
    let mut runtime = runtime.lock().await;
    (runtime.snapshot(), runtime.all_status())
}

async fn apply(
    step: &Step,
    runtime: &SharedRuntime,
    guard: &ExecutionGuard,
    clock: &ManualClock,
) -> Result<(), String> {
    match step {
        Step::Call(id) => guard
            .call(id, serde_json::json!({ "source": "keystone simulate" }))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Step::Wait(ms) => {
            clock.advance_ms(i64::try_from(*ms).unwrap_or(i64::MAX));
            Ok(())
        },
        Step::Toggle(id) => runtime
            .lock()
            .await
            .toggle_plugin(id)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Step::Fail(id) => runtime
            .lock()
            .await
            .simulate_failure(id)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Step::Reset(id) => runtime
            .lock()
            .await
            .reset_breaker(id)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}

fn status_changes(before: &RegistrySnapshot, after: &RegistrySnapshot) -> Vec<StatusChange> {
    after
        .plugins
        .iter()
        .filter_map(|plugin| {
            let from = before.status_of(plugin.id())?;
            (from != plugin.status).then(|| StatusChange {
                plugin_id: plugin.id().clone(),
                from,
                to: plugin.status,
                reason: plugin.reason.clone(),
            })
        })
        .collect()
}

fn breaker_changes(before: &[BreakerStatus], after: &[BreakerStatus]) -> Vec<BreakerChange> {
    after
        .iter()
        .filter_map(|status| {
            let prior = before.iter().find(|b| b.plugin_id == status.plugin_id)?;
            (prior.state != status.state).then(|| BreakerChange {
                plugin_id: status.plugin_id.clone(),
                from: prior.state,
                to: status.state,
            })
        })
        .collect()
}

fn print_step(report: &StepReport) {
    println!("{} {}", "▶".cyan(), report.step.bold());
    if let Some(error) = &report.error {
        println!("  {}", Theme::error(error));
    }
    for change in &report.breaker_changes {
        println!(
            "  breaker {:<20} {} → {}",
            change.plugin_id.as_str(),
            Theme::breaker(change.from),
            Theme::breaker(change.to)
        );
    }
    for change in &report.status_changes {
        let reason = change
            .reason
            .as_ref()
            .map_or_else(String::new, |r| format!("  ({r})"));
        println!(
            "  {:<28} {} → {}{}",
            change.plugin_id.as_str(),
            Theme::status(change.from),
            Theme::status(change.to),
            Theme::dimmed(&reason)
        );
    }
    let quiet = report.status_changes.is_empty() && report.breaker_changes.is_empty();
    if report.error.is_none() && quiet {
        println!("  {}", Theme::dimmed("no change"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        assert_eq!(
            "toggle:core.mic".parse::<Step>().unwrap(),
            Step::Toggle(PluginId::from_static("core.mic"))
        );
        assert_eq!("wait:30000".parse::<Step>().unwrap(), Step::Wait(30_000));
        assert_eq!(
            "call:stt.whisper".parse::<Step>().unwrap().to_string(),
            "call:stt.whisper"
        );
    }

    #[test]
    fn test_parse_rejects_bad_steps() {
        assert!("toggle".parse::<Step>().is_err());
        assert!("explode:core.mic".parse::<Step>().is_err());
        assert!("fail:Not Valid".parse::<Step>().is_err());
        assert!("wait:soon".parse::<Step>().is_err());
    }

    #[test]
    fn test_status_changes_only_lists_differences() {
        let mic = keystone_core::PluginManifest::new(PluginId::from_static("core.mic"), "Mic");
        let mut before = RegistrySnapshot::default();
        before.plugins.push(keystone_core::RuntimePlugin::new(mic));
        before.plugins[0].set_status(PluginStatus::Active, None);

        let mut after = before.clone();
        assert!(status_changes(&before, &after).is_empty());

        after.plugins[0].set_status(PluginStatus::Disabled, None);
        let changes = status_changes(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, PluginStatus::Active);
        assert_eq!(changes[0].to, PluginStatus::Disabled);
    }
}
