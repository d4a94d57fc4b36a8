//! Configuration loading for the prediction server.
//!
//! Builds a [`ServerConfig`] from defaults, an optional YAML file, and the
//! `MODEL_PATH` / `MODEL_VERSION` / `GRPC_PORT` environment overrides, in
//! that order.

use predserve_core::ServerConfig;
use std::path::{Path, PathBuf};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "PREDSERVE_CONFIG";
/// Overrides [`ServerConfig::artifact_path`].
pub const MODEL_PATH_ENV: &str = "MODEL_PATH";
/// Overrides [`ServerConfig::model_version`].
pub const MODEL_VERSION_ENV: &str = "MODEL_VERSION";
/// Overrides [`ServerConfig::port`].
pub const GRPC_PORT_ENV: &str = "GRPC_PORT";

/// Load a [`ServerConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: ServerConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

/// Apply environment overrides using `lookup` to read variables.
///
/// # Errors
///
/// Returns an error if `GRPC_PORT` is set but is not a valid port number.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup(MODEL_PATH_ENV) {
        config.artifact_path = PathBuf::from(path);
    }
    if let Some(version) = lookup(MODEL_VERSION_ENV) {
        config.model_version = version;
    }
    if let Some(port) = lookup(GRPC_PORT_ENV) {
        config.port = port
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {GRPC_PORT_ENV} value {port:?}: {e}"))?;
    }
    Ok(())
}

/// Resolve the effective configuration from an optional file path and the
/// process environment.
pub fn resolve_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}
