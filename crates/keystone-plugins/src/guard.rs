//! Execution guard.
//!
//! Wraps calls into plugins with the breaker bookkeeping. The runtime lock is
//! held only around admission and around recording the outcome, never while
//! the plugin runs.
//!
//! A failed call only counts against the breaker. Dependents are paused only
//! when that failure trips the breaker.
//!
//! While a breaker is `HalfOpen` every admitted call is a trial call; the
//! guard does not limit trials to one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use keystone_core::PluginId;

use crate::error::{GuardError, InvocationError};
use crate::runtime::SharedRuntime;

/// Performs the actual call into a plugin.
#[async_trait]
pub trait PluginInvoker: Send + Sync {
    /// Invoke the plugin with `args`.
    async fn call(
        &self,
        plugin_id: &PluginId,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, InvocationError>;
}

/// Breaker-aware front door for plugin calls.
#[derive(Clone)]
pub struct ExecutionGuard {
    runtime: SharedRuntime,
    invoker: Arc<dyn PluginInvoker>,
}

impl ExecutionGuard {
    /// Create a guard over `runtime` that calls plugins through `invoker`.
    #[must_use]
    pub fn new(runtime: SharedRuntime, invoker: Arc<dyn PluginInvoker>) -> Self {
        Self { runtime, invoker }
    }

    /// The guarded runtime.
    #[must_use]
    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }

    /// Call a plugin.
    ///
    /// # Errors
    ///
    /// - [`GuardError::NotFound`] if the plugin is not registered
    /// - [`GuardError::BreakerOpen`] if the breaker is open; the plugin is not
    ///   invoked
    /// - [`GuardError::Unavailable`] if the plugin is not active; the plugin
    ///   is not invoked
    /// - [`GuardError::Invocation`] if the plugin was invoked and failed
    pub async fn call(
        &self,
        plugin_id: &PluginId,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, GuardError> {
        let clock = {
            let mut runtime = self.runtime.lock().await;
            runtime.admit(plugin_id)?;
            runtime.clock()
        };

        let started = clock.now();
        let outcome = self.invoker.call(plugin_id, args).await;
        let latency_ms = u64::try_from(clock.now().signed_duration_since(started).num_milliseconds())
            .unwrap_or(0);

        let mut runtime = self.runtime.lock().await;
        match outcome {
            Ok(value) => {
                debug!(plugin_id = %plugin_id, latency_ms, "Plugin call succeeded");
                runtime
                    .record_success(plugin_id, latency_ms)
                    .map_err(|_| GuardError::NotFound(plugin_id.clone()))?;
                Ok(value)
            },
            Err(source) => {
                warn!(plugin_id = %plugin_id, latency_ms, error = %source, "Plugin call failed");
                runtime
                    .record_failure(plugin_id, Some(latency_ms))
                    .map_err(|_| GuardError::NotFound(plugin_id.clone()))?;
                Err(GuardError::Invocation {
                    plugin_id: plugin_id.clone(),
                    source,
                })
            },
        }
    }
}

impl std::fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PluginRuntime;
    use crate::test_support::{breaker_config, id, manifest};
    use keystone_core::{BreakerState, Clock, ManualClock, PluginStatus};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays queued outcomes, then succeeds with `null`.
    #[derive(Default)]
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<serde_json::Value, InvocationError>>>,
        calls: AtomicUsize,
        clock: Option<Arc<ManualClock>>,
    }

    impl Scripted {
        fn failing(times: usize) -> Self {
            let outcomes = (0..times)
                .map(|_| Err(InvocationError::new("device unplugged")))
                .collect();
            Self {
                outcomes: Mutex::new(outcomes),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PluginInvoker for Scripted {
        async fn call(
            &self,
            _plugin_id: &PluginId,
            args: serde_json::Value,
        ) -> Result<serde_json::Value, InvocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(clock) = &self.clock {
                clock.advance_ms(25);
            }
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(args))
        }
    }

    fn runtime(clock: &Arc<ManualClock>) -> SharedRuntime {
        let (runtime, _) = PluginRuntime::boot(
            breaker_config(),
            Arc::clone(clock) as Arc<dyn Clock>,
            vec![
                manifest("core.mic", &["audio_in"], &[]),
                manifest("stt.engine", &[], &["audio_in"]),
            ],
        );
        runtime.into_shared()
    }

    #[tokio::test]
    async fn test_successful_call_records_latency() {
        let clock = Arc::new(ManualClock::at_epoch());
        let invoker = Arc::new(Scripted {
            clock: Some(Arc::clone(&clock)),
            ..Scripted::default()
        });
        let guard = ExecutionGuard::new(runtime(&clock), invoker);

        let value = guard.call(&id("core.mic"), json!({"rate": 16000})).await.unwrap();
        assert_eq!(value, json!({"rate": 16000}));

        let status = guard.runtime().lock().await.breaker_status(&id("core.mic")).unwrap();
        assert_eq!(status.total_successes, 1);
        assert_eq!(status.last_latency_ms, Some(25));
    }

    #[tokio::test]
    async fn test_single_failure_is_reported_without_cascade() {
        let clock = Arc::new(ManualClock::at_epoch());
        let invoker = Arc::new(Scripted::failing(1));
        let guard = ExecutionGuard::new(runtime(&clock), invoker);

        let err = guard.call(&id("core.mic"), json!(null)).await.unwrap_err();
        assert!(matches!(err, GuardError::Invocation { .. }));

        let runtime = guard.runtime().lock().await;
        assert_eq!(runtime.get(&id("stt.engine")).unwrap().status, PluginStatus::Active);
    }

    #[tokio::test]
    async fn test_trip_short_circuits_and_cascades() {
        let clock = Arc::new(ManualClock::at_epoch());
        let invoker = Arc::new(Scripted::failing(3));
        let guard = ExecutionGuard::new(runtime(&clock), Arc::clone(&invoker) as Arc<dyn PluginInvoker>);
        let mic = id("core.mic");

        for _ in 0..3 {
            assert!(guard.call(&mic, json!(null)).await.is_err());
        }
        let err = guard.call(&mic, json!(null)).await.unwrap_err();
        assert!(matches!(err, GuardError::BreakerOpen { retry_at: Some(_), .. }));
        assert_eq!(invoker.calls(), 3);

        let mut runtime = guard.runtime().lock().await;
        assert_eq!(runtime.get(&mic).unwrap().status, PluginStatus::Error);
        assert_eq!(
            runtime.get(&id("stt.engine")).unwrap().status,
            PluginStatus::PausedDependency
        );
        assert_eq!(runtime.breaker_status(&mic).unwrap().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_trial_call_after_cool_down_recovers() {
        let clock = Arc::new(ManualClock::at_epoch());
        let invoker = Arc::new(Scripted::failing(3));
        let guard = ExecutionGuard::new(runtime(&clock), invoker);
        let mic = id("core.mic");

        for _ in 0..3 {
            let _ = guard.call(&mic, json!(null)).await;
        }
        clock.advance_ms(30_000);

        guard.call(&mic, json!(null)).await.unwrap();

        let mut runtime = guard.runtime().lock().await;
        assert_eq!(runtime.breaker_status(&mic).unwrap().state, BreakerState::Closed);
        assert!(runtime.get_all().iter().all(|p| p.status.is_active()));
    }

    #[tokio::test]
    async fn test_unavailable_plugin_is_not_invoked() {
        let clock = Arc::new(ManualClock::at_epoch());
        let invoker = Arc::new(Scripted::default());
        let guard = ExecutionGuard::new(runtime(&clock), Arc::clone(&invoker) as Arc<dyn PluginInvoker>);

        guard.runtime().lock().await.toggle_plugin(&id("core.mic")).unwrap();

        let err = guard.call(&id("stt.engine"), json!(null)).await.unwrap_err();
        match err {
            GuardError::Unavailable { status, reason, .. } => {
                assert_eq!(status, PluginStatus::PausedDependency);
                assert!(reason.is_some());
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_plugin() {
        let clock = Arc::new(ManualClock::at_epoch());
        let guard = ExecutionGuard::new(runtime(&clock), Arc::new(Scripted::default()));
        let err = guard.call(&id("missing"), json!(null)).await.unwrap_err();
        assert!(matches!(err, GuardError::NotFound(_)));
    }
}
