//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem paths for studio state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for the file-backed project store.
    /// Default: ~/.local/share/studio
    #[serde(default = "PathsConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl PathsConfig {
    fn default_state_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/studio"))
            .unwrap_or_else(|| PathBuf::from(".local/share/studio"))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: Self::default_state_dir(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry traces.
    /// Empty disables the exporter and leaves plain console logging.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn otlp_enabled(&self) -> bool {
        !self.otlp_endpoint.trim().is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Remote generation service connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the generation API.
    /// Default: http://127.0.0.1:3001
    #[serde(default = "BackendConfig::default_base_url")]
    pub base_url: String,

    /// Transport-level request timeout in seconds. 0 means no timeout, so a
    /// slow generation keeps the caller waiting until it resolves.
    #[serde(default)]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:3001".to_string()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            request_timeout_secs: 0,
        }
    }
}

/// All infrastructure sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}
