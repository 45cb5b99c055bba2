// Configuration module entry point
// Loads, layers and validates the server configuration

mod state;
mod types;

use std::net::SocketAddr;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, FileFormat};

// Re-export public types
pub use state::AppState;
pub use types::{AssetsConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Default config file name (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Layers, later wins: built-in defaults, the optional file, `CDN_*`
    /// environment variables (`CDN_SERVER__PORT`), then a bare `PORT`.
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let settings = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("CDN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        finish(settings)
    }

    /// Build configuration from an inline TOML document layered over the defaults
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let settings = with_defaults(config::Config::builder())?
            .add_source(config::File::from_str(source, FileFormat::Toml))
            .build()?;

        finish(settings)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Path of the single-file route for `name`, e.g. `/cdn/cat.png`
    pub fn file_route(&self, name: &str) -> String {
        format!("{}/{name}", self.assets.route_prefix)
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3000)?
        .set_default("server.trust_proxy", false)?
        .set_default("assets.root_dir", "images")?
        .set_default("assets.route_prefix", "/cdn")?
        .set_default("assets.list_path", "/cdn-list")?
        .set_default("assets.include_size", false)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", true)?
        .set_default("logging.access_log_format", "combined")?
        .set_default("performance.keep_alive_timeout", 75)?
        .set_default("performance.read_timeout", 30)?
        .set_default("performance.write_timeout", 30)?
        .set_default("http.server_name", "imgcdn")?
        .set_default("http.enable_cors", false)?
        .set_default("http.cache_max_age", 86_400) // 1 day
}

fn finish(settings: config::Config) -> Result<Config, ConfigError> {
    let mut cfg: Config = settings.try_deserialize()?;
    normalize_assets(&mut cfg.assets)?;
    Ok(cfg)
}

/// Canonicalize route shapes and the extension list, rejecting unusable values
fn normalize_assets(assets: &mut AssetsConfig) -> Result<(), ConfigError> {
    let prefix = assets.route_prefix.trim().trim_end_matches('/');
    assets.route_prefix = if prefix.is_empty() || prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{prefix}")
    };

    let list_path = assets.list_path.trim().trim_end_matches('/');
    if !list_path.starts_with('/') {
        return Err(ConfigError::Message(format!(
            "assets.list_path must be an absolute path other than '/', got '{}'",
            assets.list_path
        )));
    }
    assets.list_path = list_path.to_string();

    assets.extensions = assets
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if assets.extensions.is_empty() {
        return Err(ConfigError::Message(
            "assets.extensions must name at least one extension".to_string(),
        ));
    }

    assets.base_url = assets
        .base_url
        .take()
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.assets.root_dir, "images");
        assert_eq!(cfg.assets.route_prefix, "/cdn");
        assert_eq!(cfg.assets.list_path, "/cdn-list");
        assert!(!cfg.assets.include_size);
        assert!(cfg.assets.base_url.is_none());
        assert_eq!(cfg.assets.extensions.len(), 7);
        assert_eq!(cfg.http.cache_max_age, 86_400);
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert!(!cfg.server.trust_proxy);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let cfg = Config::from_toml(
            r#"
            [server]
            port = 8081

            [assets]
            root_dir = "/srv/img"
            route_prefix = ""
            include_size = true
            base_url = "https://cdn.example.com/"
            extensions = [".PNG", "ico"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.assets.root_dir, "/srv/img");
        assert_eq!(cfg.assets.route_prefix, "");
        assert!(cfg.assets.include_size);
        assert_eq!(
            cfg.assets.base_url.as_deref(),
            Some("https://cdn.example.com")
        );
        assert_eq!(cfg.assets.extensions, vec!["png", "ico"]);
    }

    #[test]
    fn test_route_prefix_normalized() {
        let cfg = Config::from_toml("[assets]\nroute_prefix = \"images/\"").unwrap();
        assert_eq!(cfg.assets.route_prefix, "/images");
        assert_eq!(cfg.file_route("a.png"), "/images/a.png");

        let cfg = Config::from_toml("[assets]\nroute_prefix = \"/\"").unwrap();
        assert_eq!(cfg.assets.route_prefix, "");
        assert_eq!(cfg.file_route("a.png"), "/a.png");
    }

    #[test]
    fn test_invalid_list_path_rejected() {
        assert!(Config::from_toml("[assets]\nlist_path = \"/\"").is_err());
        assert!(Config::from_toml("[assets]\nlist_path = \"list\"").is_err());

        let cfg = Config::from_toml("[assets]\nlist_path = \"/all/\"").unwrap();
        assert_eq!(cfg.assets.list_path, "/all");
    }

    #[test]
    fn test_empty_extensions_rejected() {
        assert!(Config::from_toml("[assets]\nextensions = []").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::from_toml("[server]\nhost = \"127.0.0.1\"\nport = 9000").unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 9000);
    }
}
