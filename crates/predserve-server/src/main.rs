//! predserve prediction server
//!
//! Serves a binary classifier over gRPC. Loads the model artifact once at
//! startup, degrades to a random fallback predictor when the artifact is
//! unusable, and drains in-flight calls on SIGTERM/SIGINT.

use predserve_core::LoggingConfig;
use predserve_server::config::{self, CONFIG_ENV};
use predserve_server::{shutdown_signal, ServiceHost, ShutdownCoordinator};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configuration: from CLI arg, env var, or defaults; then env overrides
    let config_path: Option<PathBuf> = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);
    let config = config::resolve_config(config_path.as_deref())?;

    init_tracing(&config.logging)?;

    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration from file"),
        None => info!("No config file specified, using defaults"),
    }
    info!(
        port = config.port,
        model_version = %config.model_version,
        artifact_path = %config.artifact_path.display(),
        "Starting predserve server"
    );

    let shutdown = ShutdownCoordinator::new(config.shutdown.timeout_seconds);
    let host = ServiceHost::new(config, shutdown.clone());

    tokio::spawn(shutdown_signal(shutdown));

    host.serve().await
}

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over `logging.level`; `logging.format`
/// selects human-readable `text` or `json` output.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| anyhow::anyhow!("Invalid log level {:?}: {}", logging.level, e))?;

    let result = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        "text" => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        other => anyhow::bail!("Unknown log format {other:?} (expected \"text\" or \"json\")"),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
