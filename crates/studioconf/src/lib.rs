//! Minimal configuration loading for the studio session engine.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): paths, telemetry, and the generation
//!   backend connection. Fixed for the life of the process.
//! - **Bootstrap** (`BootstrapConfig`): engine policies (save timeout, sync
//!   debounce, drift threshold) and backend endpoint paths.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/studio/config.toml` (system)
//! 2. `~/.config/studio/config.toml` (user)
//! 3. `./studio.toml` (local override) or an explicit `--config` path
//! 4. Environment variables (`STUDIO_*`, `RUST_LOG`, `OTEL_EXPORTER_OTLP_ENDPOINT`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! state_dir = "~/.local/share/studio"
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info"
//!
//! [backend]
//! base_url = "http://127.0.0.1:3001"
//!
//! [bootstrap.engine]
//! save_timeout_secs = 180
//! sync_debounce_ms = 3000
//! drift_threshold_secs = 0.5
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{BootstrapConfig, EndpointsConfig, EngineConfig};
pub use infra::{BackendConfig, InfraConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete studio configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl StudioConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load with an explicit file taking the place of `./studio.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and variables applied.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::read_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let origin = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::config_from_table(merged, &origin)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# Studio Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "state_dir = \"{}\"\n",
            self.infra.paths.state_dir.display()
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.infra.telemetry.otlp_endpoint
        ));
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        output.push_str("\n[backend]\n");
        output.push_str(&format!("base_url = \"{}\"\n", self.infra.backend.base_url));
        output.push_str(&format!(
            "request_timeout_secs = {}\n",
            self.infra.backend.request_timeout_secs
        ));

        let engine = &self.bootstrap.engine;
        output.push_str("\n[bootstrap.engine]\n");
        output.push_str(&format!("save_timeout_secs = {}\n", engine.save_timeout_secs));
        output.push_str(&format!("sync_debounce_ms = {}\n", engine.sync_debounce_ms));
        output.push_str(&format!(
            "drift_threshold_secs = {:?}\n",
            engine.drift_threshold_secs
        ));
        output.push_str(&format!("sync_tick_ms = {}\n", engine.sync_tick_ms));
        output.push_str(&format!("history_limit = {}\n", engine.history_limit));

        let endpoints = &self.bootstrap.endpoints;
        output.push_str("\n[bootstrap.endpoints]\n");
        output.push_str(&format!("orchestrate = \"{}\"\n", endpoints.orchestrate));
        output.push_str(&format!("image = \"{}\"\n", endpoints.image));
        output.push_str(&format!("audio = \"{}\"\n", endpoints.audio));
        output.push_str(&format!("video = \"{}\"\n", endpoints.video));
        output.push_str(&format!("text = \"{}\"\n", endpoints.text));

        output
    }
}
