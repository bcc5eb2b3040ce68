//! Toggles, failure and recovery cascades, and snapshot notifications.

use keystone_core::{PluginStatus, StatusReason};
use keystone_plugins::{PluginError, PluginRuntime};
use keystone_test::{
    SnapshotRecorder, boot_runtime, capability, cyclic_manifests, init_test_logging, manifest,
    plugin_id, voice_assistant_manifests,
};

fn status(runtime: &PluginRuntime, id: &str) -> PluginStatus {
    runtime.get(&plugin_id(id)).unwrap().status
}

#[test]
fn test_toggle_provider_pauses_and_restores_consumer() {
    init_test_logging();
    let (mut runtime, _clock) = boot_runtime(vec![
        manifest("core.mic", &["audio_in"], &[]),
        manifest("stt.engine", &[], &["audio_in"]),
    ]);
    let mic = plugin_id("core.mic");

    assert!(!runtime.toggle_plugin(&mic).unwrap());
    assert_eq!(status(&runtime, "core.mic"), PluginStatus::Disabled);
    assert_eq!(status(&runtime, "stt.engine"), PluginStatus::PausedDependency);
    assert_eq!(
        runtime.get(&plugin_id("stt.engine")).unwrap().reason,
        Some(StatusReason::DependencyInactive {
            capability: capability("audio_in")
        })
    );

    assert!(runtime.toggle_plugin(&mic).unwrap());
    assert_eq!(status(&runtime, "core.mic"), PluginStatus::Active);
    assert_eq!(status(&runtime, "stt.engine"), PluginStatus::Active);
}

#[test]
fn test_cascade_follows_the_whole_chain() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());

    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();

    for id in ["stt.whisper", "memory.recall", "llm.local", "tts.piper", "core.speaker"] {
        assert_eq!(status(&runtime, id), PluginStatus::PausedDependency, "{id}");
    }
    for id in ["embeddings.local", "vision.camera", "vision.detector", "monitor.gpu"] {
        assert_eq!(status(&runtime, id), PluginStatus::Active, "{id}");
    }

    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
    assert!(runtime.get_all().iter().all(|p| p.status.is_active()));
}

#[test]
fn test_disabled_consumer_stays_disabled() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());

    runtime.toggle_plugin(&plugin_id("stt.whisper")).unwrap();
    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
    assert_eq!(status(&runtime, "stt.whisper"), PluginStatus::Disabled);

    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
    assert_eq!(status(&runtime, "core.mic"), PluginStatus::Active);
    assert_eq!(status(&runtime, "stt.whisper"), PluginStatus::Disabled);
    assert_eq!(status(&runtime, "memory.recall"), PluginStatus::PausedDependency);
    assert_eq!(
        runtime.get(&plugin_id("memory.recall")).unwrap().reason,
        Some(StatusReason::DependencyInactive {
            capability: capability("transcript")
        })
    );
}

#[test]
fn test_one_notification_per_mutation() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());
    let recorder = SnapshotRecorder::new();
    let subscription = runtime.subscribe(recorder.callback());

    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
    runtime.toggle_plugin(&plugin_id("vision.camera")).unwrap();
    assert_eq!(recorder.count(), 2);

    let generations = recorder.generations();
    assert!(generations.windows(2).all(|w| w[0] < w[1]));

    // Observers only ever see settled snapshots.
    let last = recorder.last().unwrap();
    assert_eq!(last.status_of(&plugin_id("core.speaker")), Some(PluginStatus::PausedDependency));
    assert_eq!(last.status_of(&plugin_id("vision.detector")), Some(PluginStatus::PausedDependency));

    assert!(subscription.unsubscribe());
    runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
    assert_eq!(recorder.count(), 2);
}

#[test]
fn test_propagate_recovery_is_idempotent() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());
    let recorder = SnapshotRecorder::new();
    let _subscription = runtime.subscribe(recorder.callback());
    let mic = plugin_id("core.mic");

    runtime.propagate_recovery(&mic).unwrap();
    let first = runtime.snapshot();
    let notified = recorder.count();

    let report = runtime.propagate_recovery(&mic).unwrap();
    assert!(report.is_empty());
    assert_eq!(*runtime.snapshot(), *first);
    assert_eq!(recorder.count(), notified);
}

#[test]
fn test_propagate_failure_is_idempotent() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());
    let camera = plugin_id("vision.camera");
    runtime.toggle_plugin(&camera).unwrap();

    let before = runtime.snapshot();
    let report = runtime.propagate_failure(&camera).unwrap();
    assert!(report.is_empty());
    assert_eq!(runtime.snapshot().generation, before.generation);
}

#[test]
fn test_recovery_never_touches_cycle_members() {
    let mut manifests = cyclic_manifests();
    manifests.push(manifest("plugin.y2", &["y"], &[]));
    let (mut runtime, _clock) = boot_runtime(manifests);

    runtime.propagate_recovery(&plugin_id("plugin.y2")).unwrap();
    for id in ["plugin.c", "plugin.d", "plugin.e"] {
        assert_eq!(status(&runtime, id), PluginStatus::Error, "{id}");
    }
}

#[test]
fn test_unknown_plugin_is_not_found() {
    let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());
    let ghost = plugin_id("ghost.plugin");

    assert!(matches!(runtime.toggle_plugin(&ghost), Err(PluginError::NotFound(_))));
    assert!(matches!(runtime.propagate_failure(&ghost), Err(PluginError::NotFound(_))));
    assert!(matches!(runtime.simulate_failure(&ghost), Err(PluginError::NotFound(_))));
}
