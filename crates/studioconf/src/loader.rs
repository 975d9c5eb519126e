//! Config file discovery, layered TOML merging, and environment overlay.

use crate::{ConfigError, StudioConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local `./studio.toml`.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/studio/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("studio/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("studio.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base` key by key. Nested tables merge recursively,
/// any other value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Build a config from a merged table; missing keys take compiled defaults.
pub fn config_from_table(table: toml::Table, origin: &Path) -> Result<StudioConfig, ConfigError> {
    let mut config: StudioConfig = table.try_into().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })?;

    let state_dir = config.infra.paths.state_dir.to_string_lossy().into_owned();
    config.infra.paths.state_dir = expand_path(&state_dir);

    Ok(config)
}

/// Parse a single TOML document into a config.
pub fn parse_config(contents: &str, origin: &Path) -> Result<StudioConfig, ConfigError> {
    config_from_table(parse_table(contents, origin)?, origin)
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut StudioConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit variable list.
pub fn apply_overrides_from(
    config: &mut StudioConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let applied = match key.as_str() {
            "STUDIO_STATE_DIR" => {
                config.infra.paths.state_dir = expand_path(&value);
                true
            }
            "STUDIO_OTLP_ENDPOINT" | "OTEL_EXPORTER_OTLP_ENDPOINT" => {
                config.infra.telemetry.otlp_endpoint = value;
                true
            }
            "STUDIO_LOG_LEVEL" | "RUST_LOG" => {
                config.infra.telemetry.log_level = value;
                true
            }
            "STUDIO_BACKEND_URL" => {
                config.infra.backend.base_url = value;
                true
            }
            "STUDIO_REQUEST_TIMEOUT_SECS" => set_parsed(&mut config.infra.backend.request_timeout_secs, &value),
            "STUDIO_SAVE_TIMEOUT_SECS" => set_parsed(&mut config.bootstrap.engine.save_timeout_secs, &value),
            "STUDIO_SYNC_DEBOUNCE_MS" => set_parsed(&mut config.bootstrap.engine.sync_debounce_ms, &value),
            "STUDIO_DRIFT_THRESHOLD_SECS" => {
                set_parsed(&mut config.bootstrap.engine.drift_threshold_secs, &value)
            }
            "STUDIO_SYNC_TICK_MS" => set_parsed(&mut config.bootstrap.engine.sync_tick_ms, &value),
            "STUDIO_HISTORY_LIMIT" => set_parsed(&mut config.bootstrap.engine.history_limit, &value),
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, raw: &str) -> bool {
    match raw.trim().parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}

/// Expand `~/` and a leading `$VAR` in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        return directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(stripped) = path.strip_prefix('$') {
        let (var_name, rest) = match stripped.find('/') {
            Some(pos) => (&stripped[..pos], Some(&stripped[pos + 1..])),
            None => (stripped, None),
        };
        return match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        };
    }

    PathBuf::from(path)
}
