// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub assets: AssetsConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    /// Take the scheme from `X-Forwarded-Proto` (set when behind a proxy)
    #[serde(default)]
    pub trust_proxy: bool,
}

/// Asset directory and route layout
#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    /// Flat directory the images are served from
    pub root_dir: String,
    /// Prefix of the single-file route ("/cdn" serves "/cdn/<name>", "" serves "/<name>")
    pub route_prefix: String,
    /// Exact path of the listing endpoint
    pub list_path: String,
    /// Public origin used to build listing URLs; derived from the request when unset
    #[serde(default)]
    pub base_url: Option<String>,
    /// Attach the byte size of every listed file
    #[serde(default)]
    pub include_size: bool,
    /// Case-insensitive extension allow-list for the listing
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

pub(super) fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Zero disables HTTP keep-alive
    pub keep_alive_timeout: u64,
    /// Seconds a client gets to send request headers, also while idle between requests
    pub read_timeout: u64,
    /// Seconds in-flight responses get to finish once shutdown starts
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    /// `max-age` sent with served files, in seconds
    pub cache_max_age: u32,
}
