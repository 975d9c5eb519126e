//! Bootstrap configuration - seeds engine policy at startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session engine policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a save may take before it is reported as timed out.
    /// Default: 180 (three minutes)
    #[serde(default = "EngineConfig::default_save_timeout_secs")]
    pub save_timeout_secs: u64,

    /// Quiet period before a background sync fires.
    /// Default: 3000
    #[serde(default = "EngineConfig::default_sync_debounce_ms")]
    pub sync_debounce_ms: u64,

    /// Drift beyond which a secondary track is re-seeked.
    /// Default: 0.5
    #[serde(default = "EngineConfig::default_drift_threshold_secs")]
    pub drift_threshold_secs: f64,

    /// Period of the synchronizer tick.
    /// Default: 250
    #[serde(default = "EngineConfig::default_sync_tick_ms")]
    pub sync_tick_ms: u64,

    /// Maximum undo snapshots kept. 0 keeps everything.
    #[serde(default)]
    pub history_limit: usize,
}

impl EngineConfig {
    fn default_save_timeout_secs() -> u64 {
        180
    }

    fn default_sync_debounce_ms() -> u64 {
        3_000
    }

    fn default_drift_threshold_secs() -> f64 {
        0.5
    }

    fn default_sync_tick_ms() -> u64 {
        250
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_secs(self.save_timeout_secs)
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn sync_tick(&self) -> Duration {
        Duration::from_millis(self.sync_tick_ms.max(1))
    }

    pub fn history_limit(&self) -> Option<usize> {
        (self.history_limit > 0).then_some(self.history_limit)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_timeout_secs: Self::default_save_timeout_secs(),
            sync_debounce_ms: Self::default_sync_debounce_ms(),
            drift_threshold_secs: Self::default_drift_threshold_secs(),
            sync_tick_ms: Self::default_sync_tick_ms(),
            history_limit: 0,
        }
    }
}

/// Request paths on the generation backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "EndpointsConfig::default_orchestrate")]
    pub orchestrate: String,

    #[serde(default = "EndpointsConfig::default_image")]
    pub image: String,

    #[serde(default = "EndpointsConfig::default_audio")]
    pub audio: String,

    #[serde(default = "EndpointsConfig::default_video")]
    pub video: String,

    /// Generic text completion, used as the fallback for every media call.
    #[serde(default = "EndpointsConfig::default_text")]
    pub text: String,
}

impl EndpointsConfig {
    fn default_orchestrate() -> String {
        "/api/orchestrate".to_string()
    }

    fn default_image() -> String {
        "/api/generate-image".to_string()
    }

    fn default_audio() -> String {
        "/api/generate-audio".to_string()
    }

    fn default_video() -> String {
        "/api/generate-video".to_string()
    }

    fn default_text() -> String {
        "/api/generate".to_string()
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            orchestrate: Self::default_orchestrate(),
            image: Self::default_image(),
            audio: Self::default_audio(),
            video: Self::default_video(),
            text: Self::default_text(),
        }
    }
}

/// Bootstrap sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,
}
