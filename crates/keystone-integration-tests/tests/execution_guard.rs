//! Calls through the execution guard with a scripted invoker.

use std::sync::Arc;

use keystone_core::{BreakerState, ManualClock, PluginStatus};
use keystone_plugins::{ExecutionGuard, GuardError, PluginInvoker};
use keystone_test::{
    ScriptedInvoker, boot_runtime, init_test_logging, plugin_id, voice_assistant_manifests,
};
use serde_json::json;

fn guard_with(invoker: &ScriptedInvoker) -> (ExecutionGuard, Arc<ManualClock>) {
    let (runtime, clock) = boot_runtime(voice_assistant_manifests());
    let invoker: Arc<dyn PluginInvoker> = Arc::new(invoker.clone());
    (ExecutionGuard::new(runtime.into_shared(), invoker), clock)
}

#[tokio::test]
async fn test_success_passes_value_through() {
    init_test_logging();
    let invoker = ScriptedInvoker::new().with_success(json!({"text": "hello"}));
    let (guard, _clock) = guard_with(&invoker);
    let stt = plugin_id("stt.whisper");

    let value = guard.call(&stt, json!({"chunk": 1})).await.unwrap();
    assert_eq!(value, json!({"text": "hello"}));
    assert_eq!(invoker.calls(), vec![stt.clone()]);

    let status = guard.runtime().lock().await.breaker_status(&stt).unwrap();
    assert_eq!(status.total_successes, 1);
}

#[tokio::test]
async fn test_latency_comes_from_the_clock() {
    let (runtime, clock) = boot_runtime(voice_assistant_manifests());
    let invoker = ScriptedInvoker::new().with_latency(Arc::clone(&clock), 120);
    let guard = ExecutionGuard::new(runtime.into_shared(), Arc::new(invoker));
    let mic = plugin_id("core.mic");

    guard.call(&mic, json!(null)).await.unwrap();

    let status = guard.runtime().lock().await.breaker_status(&mic).unwrap();
    assert_eq!(status.last_latency_ms, Some(120));
}

#[tokio::test]
async fn test_single_failure_does_not_cascade() {
    let invoker = ScriptedInvoker::new().with_failures(1, "buffer overrun");
    let (guard, _clock) = guard_with(&invoker);
    let mic = plugin_id("core.mic");

    let err = guard.call(&mic, json!(null)).await.unwrap_err();
    assert!(matches!(err, GuardError::Invocation { .. }));
    assert!(err.to_string().contains("buffer overrun"));

    let runtime = guard.runtime().lock().await;
    assert!(runtime.get_all().iter().all(|p| p.status.is_active()));
}

#[tokio::test]
async fn test_trip_short_circuits_without_invoking() {
    let invoker = ScriptedInvoker::new().with_failures(3, "device unplugged");
    let (guard, _clock) = guard_with(&invoker);
    let mic = plugin_id("core.mic");

    for _ in 0..3 {
        assert!(guard.call(&mic, json!(null)).await.is_err());
    }
    let err = guard.call(&mic, json!(null)).await.unwrap_err();
    assert!(matches!(err, GuardError::BreakerOpen { .. }));
    assert_eq!(invoker.call_count(), 3);

    let mut runtime = guard.runtime().lock().await;
    assert_eq!(runtime.get(&mic).unwrap().status, PluginStatus::Error);
    assert_eq!(
        runtime.get(&plugin_id("stt.whisper")).unwrap().status,
        PluginStatus::PausedDependency
    );
    assert_eq!(runtime.breaker_status(&mic).unwrap().rejected_calls, 1);
}

#[tokio::test]
async fn test_paused_dependent_is_not_invoked() {
    let invoker = ScriptedInvoker::new();
    let (guard, _clock) = guard_with(&invoker);

    guard
        .runtime()
        .lock()
        .await
        .toggle_plugin(&plugin_id("core.mic"))
        .unwrap();

    let err = guard.call(&plugin_id("tts.piper"), json!(null)).await.unwrap_err();
    assert!(matches!(
        err,
        GuardError::Unavailable {
            status: PluginStatus::PausedDependency,
            ..
        }
    ));
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_trial_call_closes_breaker_and_recovers_chain() {
    let invoker = ScriptedInvoker::new().with_failures(3, "camera busy");
    let (guard, clock) = guard_with(&invoker);
    let camera = plugin_id("vision.camera");

    for _ in 0..3 {
        let _ = guard.call(&camera, json!(null)).await;
    }
    assert!(matches!(
        guard.call(&camera, json!(null)).await,
        Err(GuardError::BreakerOpen { .. })
    ));

    clock.advance_ms(30_000);
    guard.call(&camera, json!({"frame": 0})).await.unwrap();

    let mut runtime = guard.runtime().lock().await;
    assert_eq!(runtime.breaker_status(&camera).unwrap().state, BreakerState::Closed);
    assert!(runtime.get_all().iter().all(|p| p.status.is_active()));
}

#[tokio::test]
async fn test_failed_trial_reopens() {
    let invoker = ScriptedInvoker::new().with_failures(4, "still broken");
    let (guard, clock) = guard_with(&invoker);
    let camera = plugin_id("vision.camera");

    for _ in 0..3 {
        let _ = guard.call(&camera, json!(null)).await;
    }
    clock.advance_ms(30_000);

    let err = guard.call(&camera, json!(null)).await.unwrap_err();
    assert!(matches!(err, GuardError::Invocation { .. }));

    let mut runtime = guard.runtime().lock().await;
    assert_eq!(runtime.breaker_status(&camera).unwrap().state, BreakerState::Open);
    assert_eq!(
        runtime.get(&plugin_id("vision.detector")).unwrap().status,
        PluginStatus::PausedDependency
    );
}

#[tokio::test]
async fn test_trial_call_waits_for_dependencies() {
    let invoker = ScriptedInvoker::new();
    let (guard, clock) = guard_with(&invoker);
    let mic = plugin_id("core.mic");
    let stt = plugin_id("stt.whisper");

    {
        let mut runtime = guard.runtime().lock().await;
        runtime.toggle_plugin(&mic).unwrap();
        for _ in 0..3 {
            runtime.simulate_failure(&stt).unwrap();
        }
        assert_eq!(runtime.get(&stt).unwrap().status, PluginStatus::Error);
    }
    clock.advance_ms(30_000);

    let err = guard.call(&stt, json!(null)).await.unwrap_err();
    assert!(matches!(
        err,
        GuardError::Unavailable {
            status: PluginStatus::PausedDependency,
            reason: Some(_),
            ..
        }
    ));
    assert_eq!(invoker.call_count(), 0);

    guard.runtime().lock().await.toggle_plugin(&mic).unwrap();
    guard.call(&stt, json!(null)).await.unwrap();
    assert_eq!(invoker.call_count(), 1);

    let mut runtime = guard.runtime().lock().await;
    assert_eq!(runtime.breaker_status(&stt).unwrap().state, BreakerState::Closed);
    assert_eq!(runtime.get(&stt).unwrap().status, PluginStatus::Active);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_runtime() {
    let invoker = ScriptedInvoker::new();
    let (guard, _clock) = guard_with(&invoker);
    let ids = ["core.mic", "stt.whisper", "vision.camera", "llm.local", "tts.piper"];

    let mut handles = Vec::new();
    for id in ids {
        let guard = guard.clone();
        handles.push(tokio::spawn(async move {
            guard.call(&plugin_id(id), json!({"from": id})).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(invoker.call_count(), ids.len());
    let mut runtime = guard.runtime().lock().await;
    let successes: u64 = runtime.all_status().iter().map(|s| s.total_successes).sum();
    assert_eq!(successes, 5);
}

#[tokio::test]
async fn test_unknown_plugin() {
    let invoker = ScriptedInvoker::new();
    let (guard, _clock) = guard_with(&invoker);
    let err = guard.call(&plugin_id("ghost.plugin"), json!(null)).await.unwrap_err();
    assert!(matches!(err, GuardError::NotFound(_)));
    assert_eq!(invoker.call_count(), 0);
}
