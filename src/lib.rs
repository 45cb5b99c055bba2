//! # imgcdn
//!
//! A minimal image CDN: one flat directory on local disk, served over HTTP.
//!
//! - `GET /` describes the endpoints
//! - `GET /cdn/<name>` serves one file (prefix configurable, may be empty)
//! - `GET /cdn-list` lists the images with absolute URLs
//!
//! Names containing `..`, `/` or `\` are rejected before the filesystem is
//! touched, and nothing whose resolved path leaves the directory is ever
//! served or listed.

pub mod assets;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{AppState, Config};
use crate::error::StartupError;

/// A server whose socket is bound and whose asset directory exists
pub struct BoundServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl BoundServer {
    /// Create the asset directory if needed and bind the listen address
    pub async fn bind(config: Config) -> Result<Self, StartupError> {
        let addr = config.get_socket_addr().map_err(StartupError::Address)?;
        let state = AppState::new(config);

        let created = state
            .store
            .ensure_root()
            .await
            .map_err(|source| StartupError::AssetDir {
                path: state.config.assets.root_dir.clone(),
                source,
            })?;
        if created {
            logger::log_asset_dir_created(&state.config.assets.root_dir);
        }

        let listener =
            server::create_listener(addr).map_err(|source| StartupError::Bind { addr, source })?;

        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves and in-flight connections drain
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = self.listener.local_addr() {
            logger::log_server_start(&addr, &self.state.config);
        }
        server::start_server_loop(self.listener, self.state, shutdown).await
    }
}
