//! Logger module
//!
//! Thin named helpers over `tracing` so call sites read the same everywhere:
//! - Server lifecycle logging
//! - Access logging with multiple formats (on the `access` target)
//! - Error, warning and debug logging

mod format;

pub use format::AccessLogEntry;

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::StartupError;

/// Initialize the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `logging.level` from the config.
/// Should be called once at application startup.
pub fn init(config: &Config) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .map_err(|e| StartupError::Logger(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| StartupError::Logger(e.to_string()))
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    let assets = &config.assets;
    tracing::info!("CDN server running on http://{addr}");
    tracing::info!(
        "Serving '{}' at http://{addr}{}",
        assets.root_dir,
        config.file_route("<image_name>")
    );
    tracing::info!("Listing images at http://{addr}{}", assets.list_path);
    if let Some(ref base) = assets.base_url {
        tracing::info!("Public base URL: {base}");
    }
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    tracing::info!("Log level: {}", config.logging.level);
}

pub fn log_asset_dir_created(path: &str) {
    tracing::info!("Created asset directory '{path}'");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_shutdown(in_flight: usize) {
    tracing::info!("Shutdown signal received, draining {in_flight} connection(s)");
}

pub fn log_stopped() {
    tracing::info!("Server stopped");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_debug(message: &str) {
    tracing::debug!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
