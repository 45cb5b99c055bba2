//! Error types.
//!
//! [`CdnError`] is the request-level error: every variant maps to exactly one
//! HTTP status and one JSON body. The body is built from fixed strings and the
//! client-supplied name or path only; IO error text stays in the logs.

use hyper::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a single request
#[derive(Debug, Error)]
pub enum CdnError {
    /// Name contains a traversal sequence or a path separator
    #[error("invalid image name: {name:?}")]
    InvalidName { name: String },

    /// Name is well-formed but nothing servable backs it
    #[error("image not found: {name}")]
    NotFound { name: String },

    /// The asset directory could not be enumerated
    #[error("could not read asset directory: {0}")]
    DirectoryUnreadable(#[source] std::io::Error),

    /// No route matched the request
    #[error("route not found: {path}")]
    RouteUnmatched { path: String },

    /// Anything else that went wrong while handling the request
    #[error("internal error: {0}")]
    Internal(String),
}

impl CdnError {
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::RouteUnmatched { .. } => StatusCode::NOT_FOUND,
            Self::DirectoryUnreadable(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing JSON body
    ///
    /// `available_routes` is only attached to `RouteUnmatched`.
    pub fn to_body(&self, available_routes: &Value) -> Value {
        match self {
            Self::InvalidName { .. } => json!({
                "error": "Invalid image name",
                "message": "Image name contains invalid characters",
            }),
            Self::NotFound { name } => json!({
                "error": "Image not found",
                "message": format!("Image '{name}' does not exist"),
            }),
            Self::DirectoryUnreadable(_) => json!({
                "error": "Server error",
                "message": "Could not read images directory",
            }),
            Self::RouteUnmatched { path } => json!({
                "error": "Route not found",
                "message": format!("Route {path} does not exist"),
                "availableRoutes": available_routes,
            }),
            Self::Internal(_) => json!({
                "error": "Internal server error",
                "message": "Something went wrong on the server",
            }),
        }
    }

    /// Server faults are logged with full detail; client errors are not
    pub const fn is_server_fault(&self) -> bool {
        matches!(self, Self::DirectoryUnreadable(_) | Self::Internal(_))
    }
}

/// Fatal errors raised before the server starts accepting connections
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid listen address: {0}")]
    Address(String),

    #[error("could not prepare asset directory '{path}': {source}")]
    AssetDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("logger initialization failed: {0}")]
    Logger(String),
}
