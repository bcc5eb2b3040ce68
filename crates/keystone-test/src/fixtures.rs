//! Test fixtures for manifests, clocks and runtimes.

use std::sync::Arc;
use std::time::Duration;

use keystone_core::{CapabilityName, Clock, ManualClock, PluginId, PluginManifest};
use keystone_plugins::{BreakerConfig, PluginRuntime};

/// Create a validated plugin ID.
///
/// # Panics
///
/// Panics if `id` is not a valid plugin ID.
#[must_use]
pub fn plugin_id(id: &str) -> PluginId {
    PluginId::new(id).expect("valid plugin id")
}

/// Create a validated capability name.
///
/// # Panics
///
/// Panics if `name` is not a valid capability name.
#[must_use]
pub fn capability(name: &str) -> CapabilityName {
    CapabilityName::new(name).expect("valid capability name")
}

/// Create a manifest named after its ID.
///
/// # Panics
///
/// Panics if the ID or any capability name is invalid.
#[must_use]
pub fn manifest(id: &str, provides: &[&str], requires: &[&str]) -> PluginManifest {
    let mut manifest = PluginManifest::new(plugin_id(id), id);
    manifest.provides = provides.iter().map(|c| capability(c)).collect();
    manifest.requires = requires.iter().map(|c| capability(c)).collect();
    manifest
}

/// A local voice and vision assistant.
///
/// ```text
/// core.mic ─audio_in─► stt.whisper ─transcript─► llm.local ─reply─► tts.piper ─audio_out─► core.speaker
///                                  └─transcript─► memory.recall ◄─embeddings─ embeddings.local
/// vision.camera ─frames─► vision.detector ─scene─► llm.local
/// monitor.gpu
/// ```
#[must_use]
pub fn voice_assistant_manifests() -> Vec<PluginManifest> {
    vec![
        manifest("core.mic", &["audio_in"], &[]),
        manifest("stt.whisper", &["transcript"], &["audio_in"]),
        manifest("embeddings.local", &["embeddings"], &[]),
        manifest("memory.recall", &["memories"], &["transcript", "embeddings"]),
        manifest("vision.camera", &["frames"], &[]),
        manifest("vision.detector", &["scene"], &["frames"]),
        manifest("llm.local", &["reply"], &["transcript", "scene"]),
        manifest("tts.piper", &["audio_out"], &["reply"]),
        manifest("core.speaker", &[], &["audio_out"]),
        manifest("monitor.gpu", &["gpu_stats"], &[]),
    ]
}

/// Two plugins that require each other, plus a plugin that needs the cycle.
#[must_use]
pub fn cyclic_manifests() -> Vec<PluginManifest> {
    vec![
        manifest("plugin.c", &["z"], &["y"]),
        manifest("plugin.d", &["y"], &["z"]),
        manifest("plugin.e", &[], &["z"]),
    ]
}

/// Threshold 3, window 5 s, cool-down 30 s.
#[must_use]
pub fn test_breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        failure_window: Duration::from_millis(5_000),
        cool_down: Duration::from_millis(30_000),
    }
}

/// A manual clock at the Unix epoch.
#[must_use]
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_epoch())
}

/// Boot a runtime on a manual clock with [`test_breaker_config`].
///
/// # Panics
///
/// Panics if any manifest is rejected.
#[must_use]
pub fn boot_runtime(manifests: Vec<PluginManifest>) -> (PluginRuntime, Arc<ManualClock>) {
    let clock = manual_clock();
    let (runtime, errors) = PluginRuntime::boot(
        test_breaker_config(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        manifests,
    );
    assert!(errors.is_empty(), "rejected manifests: {errors:?}");
    (runtime, clock)
}
