//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. Routes are tried in a fixed
//! order: listing, root info, single-file, then the route-not-found fallback.
//! Each request runs in its own task so a panic in a handler becomes a 500
//! for that request only.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::header::{self, HeaderMap};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

use crate::assets::{self, list_assets};
use crate::config::{AppState, Config};
use crate::error::CdnError;
use crate::handler::static_files;
use crate::http::{self, HttpResponse};
use crate::logger::{self, AccessLogEntry};

/// Request context: everything the handlers need, detached from the body
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub http_version: String,
    pub host: Option<String>,
    pub scheme: String,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub range_header: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub remote_addr: SocketAddr,
}

impl RequestContext {
    /// `x-forwarded-proto` is only honoured when `trust_proxy` is set
    pub fn from_request<B>(req: &Request<B>, remote_addr: SocketAddr, trust_proxy: bool) -> Self {
        let headers = req.headers();
        let uri = req.uri();

        let host = header_string(headers, header::HOST.as_str())
            .or_else(|| uri.authority().map(ToString::to_string));
        let forwarded_proto = trust_proxy
            .then(|| header_string(headers, "x-forwarded-proto"))
            .flatten()
            .and_then(|p| p.split(',').next().map(|s| s.trim().to_string()));
        let scheme = forwarded_proto
            .or_else(|| uri.scheme_str().map(ToString::to_string))
            .unwrap_or_else(|| "http".to_string());

        Self {
            method: req.method().clone(),
            path: uri.path().to_string(),
            query: uri.query().map(ToString::to_string),
            http_version: format!("{:?}", req.version())
                .trim_start_matches("HTTP/")
                .to_string(),
            host,
            scheme,
            if_none_match: header_string(headers, header::IF_NONE_MATCH.as_str()),
            if_modified_since: header_string(headers, header::IF_MODIFIED_SINCE.as_str()),
            range_header: header_string(headers, header::RANGE.as_str()),
            referer: header_string(headers, header::REFERER.as_str()),
            user_agent: header_string(headers, header::USER_AGENT.as_str()),
            remote_addr,
        }
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }

    /// Path plus query string, as the client sent it
    pub fn original_url(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// Origin the client used to reach us, e.g. `http://localhost:3000`
    fn origin(&self, fallback_port: u16) -> String {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| format!("localhost:{fallback_port}"));
        format!("{}://{host}", self.scheme)
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    remote_addr: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let ctx = Arc::new(RequestContext::from_request(
        &req,
        remote_addr,
        state.config.server.trust_proxy,
    ));
    drop(req);

    let response = respond(Arc::clone(&ctx), Arc::clone(&state)).await;

    if state.config.logging.access_log {
        log_access(&ctx, &response, started, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Run the dispatcher and turn every outcome into exactly one response
pub async fn respond(ctx: Arc<RequestContext>, state: Arc<AppState>) -> HttpResponse {
    let task = tokio::spawn(dispatch(Arc::clone(&ctx), Arc::clone(&state)));

    let mut response = match task.await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => error_response(&err, &ctx, &state.config),
        Err(join_err) => {
            let err = CdnError::Internal(format!("handler task failed: {join_err}"));
            error_response(&err, &ctx, &state.config)
        }
    };

    if ctx.is_head() {
        response = http::strip_body(response);
    }
    http::apply_common_headers(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );
    response
}

/// Route a request to the listing, info or file handler
async fn dispatch(ctx: Arc<RequestContext>, state: Arc<AppState>) -> Result<HttpResponse, CdnError> {
    match ctx.method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return Ok(http::build_options_response(state.config.http.enable_cors)),
        _ => return Err(route_unmatched(&ctx)),
    }

    let assets = &state.config.assets;

    // 1. Listing
    if is_list_path(&ctx.path, &assets.list_path) {
        return list_images(&ctx, &state).await;
    }

    // 2. Root info
    if ctx.path == "/" {
        return Ok(info_response(&ctx, &state.config));
    }

    // 3. Single file
    if let Some(raw) = file_segment(&ctx.path, &assets.route_prefix) {
        return serve_image(&ctx, &state, raw).await;
    }

    // 4. Fallback
    Err(route_unmatched(&ctx))
}

/// Listing path, with or without one trailing slash
fn is_list_path(path: &str, list_path: &str) -> bool {
    path.strip_suffix('/').unwrap_or(path) == list_path
}

/// Name part of a single-file route, if `path` is one
///
/// `/cdn/a.png` under prefix `/cdn` yields `a.png`. Everything after the
/// prefix is returned, separators included, so the validator can reject it.
fn file_segment<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)?
        .strip_prefix('/')
        .filter(|name| !name.is_empty())
}

/// Name validator, then existence gate, then transfer
async fn serve_image(
    ctx: &RequestContext,
    state: &AppState,
    raw: &str,
) -> Result<HttpResponse, CdnError> {
    let decoded = assets::decode_name(raw)?;
    let name = assets::validate_name(&decoded)?;
    let file = state.store.check_exists(name).await?;
    static_files::serve_file(ctx, state, file).await
}

async fn list_images(ctx: &RequestContext, state: &AppState) -> Result<HttpResponse, CdnError> {
    let config = &state.config;
    let link_base = format!("{}{}", public_origin(ctx, config), config.assets.route_prefix);
    let listing = list_assets(
        &state.store,
        &link_base,
        config.assets.base_url.as_deref(),
        state.listing_options(),
    )
    .await?;
    Ok(http::json_response(StatusCode::OK, &listing))
}

fn info_response(ctx: &RequestContext, config: &Config) -> HttpResponse {
    let body = json!({
        "message": "CDN Server is running",
        "endpoints": {
            "getImage": format!("GET {}", config.file_route(":imageName")),
            "listImages": format!("GET {}", config.assets.list_path),
            "example": format!(
                "{}{}",
                public_origin(ctx, config),
                config.file_route("your-image.jpg")
            ),
        },
    });
    http::json_response(StatusCode::OK, &body)
}

/// Configured public base URL, or the origin derived from the request
fn public_origin(ctx: &RequestContext, config: &Config) -> String {
    config
        .assets
        .base_url
        .clone()
        .unwrap_or_else(|| ctx.origin(config.server.port))
}

fn available_routes(config: &Config) -> Value {
    json!({
        "home": "GET /",
        "getImage": format!("GET {}", config.file_route(":imageName")),
        "listImages": format!("GET {}", config.assets.list_path),
    })
}

fn route_unmatched(ctx: &RequestContext) -> CdnError {
    CdnError::RouteUnmatched {
        path: ctx.original_url(),
    }
}

/// Build the client-facing error; server faults are logged in full first
fn error_response(err: &CdnError, ctx: &RequestContext, config: &Config) -> HttpResponse {
    if err.is_server_fault() {
        logger::log_error(&format!(
            "{} {} failed: {err}",
            ctx.method,
            ctx.original_url()
        ));
    }
    http::build_error_response(err, &available_routes(config))
}

fn log_access(ctx: &RequestContext, response: &HttpResponse, started: Instant, format: &str) {
    let mut entry = AccessLogEntry::new(
        ctx.remote_addr.ip().to_string(),
        ctx.method.to_string(),
        ctx.path.clone(),
    );
    entry.query.clone_from(&ctx.query);
    entry.http_version.clone_from(&ctx.http_version);
    entry.status = response.status().as_u16();
    entry.body_bytes = if ctx.is_head() {
        0
    } else {
        response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    entry.referer.clone_from(&ctx.referer);
    entry.user_agent.clone_from(&ctx.user_agent);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    logger::log_access(&entry, format);
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::body::Bytes;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        state: Arc<AppState>,
    }

    fn fixture(files: &[(&str, &[u8])], extra_toml: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        for (name, data) in files {
            std::fs::write(dir.path().join(name), data).unwrap();
        }
        let toml = format!(
            "[assets]\nroot_dir = {:?}\n{extra_toml}\n[logging]\naccess_log = false\n",
            dir.path().display().to_string()
        );
        let config = Config::from_toml(&toml).unwrap();
        Fixture {
            _dir: dir,
            state: AppState::new(config),
        }
    }

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost:3000")
            .body(())
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<()>) -> HttpResponse {
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        handle_request(req, Arc::clone(state), addr).await.unwrap()
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> HttpResponse {
        send(state, request(Method::GET, uri)).await
    }

    async fn body(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    async fn json_body(response: HttpResponse) -> Value {
        serde_json::from_slice(&body(response).await).unwrap()
    }

    #[test]
    fn test_file_segment() {
        assert_eq!(file_segment("/cdn/a.png", "/cdn"), Some("a.png"));
        assert_eq!(file_segment("/cdn/../x", "/cdn"), Some("../x"));
        assert_eq!(file_segment("/cdn/", "/cdn"), None);
        assert_eq!(file_segment("/cdn", "/cdn"), None);
        assert_eq!(file_segment("/cdnx/a.png", "/cdn"), None);
        assert_eq!(file_segment("/a.png", ""), Some("a.png"));
        assert_eq!(file_segment("/", ""), None);
    }

    #[tokio::test]
    async fn test_serves_existing_file() {
        let fx = fixture(&[("a.png", b"\x89PNG")], "");
        let response = get(&fx.state, "/cdn/a.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=86400");
        assert!(response.headers().contains_key(header::ETAG));
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
        assert_eq!(response.headers()[header::SERVER], "imgcdn");
        assert_eq!(body(response).await.as_ref(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_filesystem() {
        // The root does not even exist: a filesystem lookup would 404, not 400
        let fx = fixture(&[], "");
        std::fs::remove_dir_all(fx.state.store.root()).unwrap();

        for uri in [
            "/cdn/../../etc/passwd",
            "/cdn/..%2F..%2Fetc%2Fpasswd",
            "/cdn/a%5Cb.png",
            "/cdn/nested/a.png",
            "/cdn/..",
        ] {
            let response = get(&fx.state, uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let json = json_body(response).await;
            assert_eq!(json["error"], "Invalid image name");
            assert_eq!(json["message"], "Image name contains invalid characters");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let fx = fixture(&[("a.png", b"x")], "");
        let response = get(&fx.state, "/cdn/missing.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Image not found");
        assert_eq!(json["message"], "Image 'missing.png' does not exist");
    }

    #[tokio::test]
    async fn test_listing_scenario() {
        let fx = fixture(&[("a.png", b"1"), ("b.txt", b"2"), ("c.JPG", b"3")], "");
        let response = get(&fx.state, "/cdn-list").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["count"], 2);
        let images = json["images"].as_array().unwrap();
        assert_eq!(images.len(), 2);
        let mut names: Vec<&str> = images.iter().map(|i| i["name"].as_str().unwrap()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.png", "c.JPG"]);
        for image in images {
            let url = image["url"].as_str().unwrap();
            assert!(url.starts_with("http://localhost:3000/cdn/"), "{url}");
        }
        assert!(json.get("server").is_none());
    }

    #[tokio::test]
    async fn test_listing_with_base_url_and_size() {
        let fx = fixture(
            &[("a.png", b"12345")],
            "base_url = \"https://img.example.com\"\ninclude_size = true",
        );
        let json = json_body(get(&fx.state, "/cdn-list").await).await;
        assert_eq!(json["images"][0]["url"], "https://img.example.com/cdn/a.png");
        assert_eq!(json["images"][0]["size"], 5);
        assert_eq!(json["server"], "https://img.example.com");
    }

    #[test]
    fn test_is_list_path() {
        assert!(is_list_path("/cdn-list", "/cdn-list"));
        assert!(is_list_path("/cdn-list/", "/cdn-list"));
        assert!(!is_list_path("/cdn-list//", "/cdn-list"));
        assert!(!is_list_path("/cdn-list/extra", "/cdn-list"));
        assert!(!is_list_path("/", "/cdn-list"));
    }

    #[tokio::test]
    async fn test_listing_accepts_trailing_slash() {
        let fx = fixture(&[("a.png", b"1")], "");
        let response = get(&fx.state, "/cdn-list/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert_eq!(json_body(response).await["count"], 1);
    }

    #[tokio::test]
    async fn test_forwarded_proto_ignored_by_default() {
        let fx = fixture(&[("a.png", b"1")], "");
        let req = Request::builder()
            .uri("/cdn-list")
            .header("host", "cdn.internal")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        let json = json_body(send(&fx.state, req).await).await;
        assert_eq!(json["images"][0]["url"], "http://cdn.internal/cdn/a.png");
    }

    #[tokio::test]
    async fn test_listing_uses_forwarded_proto() {
        let fx = fixture(&[("a.png", b"1")], "[server]\ntrust_proxy = true");
        let req = Request::builder()
            .uri("/cdn-list")
            .header("host", "cdn.internal")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        let json = json_body(send(&fx.state, req).await).await;
        assert_eq!(json["images"][0]["url"], "https://cdn.internal/cdn/a.png");
    }

    #[tokio::test]
    async fn test_listing_directory_deleted() {
        let fx = fixture(&[("a.png", b"1")], "");
        std::fs::remove_dir_all(fx.state.store.root()).unwrap();

        let response = get(&fx.state, "/cdn-list").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Server error");
        assert_eq!(json["message"], "Could not read images directory");
    }

    #[tokio::test]
    async fn test_root_info() {
        let fx = fixture(&[], "");
        let response = get(&fx.state, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["message"], "CDN Server is running");
        assert_eq!(json["endpoints"]["getImage"], "GET /cdn/:imageName");
        assert_eq!(json["endpoints"]["listImages"], "GET /cdn-list");
        assert_eq!(
            json["endpoints"]["example"],
            "http://localhost:3000/cdn/your-image.jpg"
        );
    }

    #[tokio::test]
    async fn test_unmatched_route_echoes_path() {
        let fx = fixture(&[], "");
        for uri in ["/nope", "/cdn/", "/cdn-list/extra", "/deep/path?x=1"] {
            let response = get(&fx.state, uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            let json = json_body(response).await;
            assert_eq!(json["error"], "Route not found");
            assert!(json["message"].as_str().unwrap().contains(uri));
            assert_eq!(json["availableRoutes"]["home"], "GET /");
        }
    }

    #[tokio::test]
    async fn test_other_methods_fall_through() {
        let fx = fixture(&[("a.png", b"x")], "");
        let response = send(&fx.state, request(Method::POST, "/cdn/a.png")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Route not found");
    }

    #[tokio::test]
    async fn test_root_level_prefix() {
        let fx = fixture(&[("a.png", b"x"), ("cdn-list", b"not an image")], "route_prefix = \"\"");

        let response = get(&fx.state, "/a.png").await;
        assert_eq!(response.status(), StatusCode::OK);

        // The listing route is not shadowed by the file route
        let json = json_body(get(&fx.state, "/cdn-list").await).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["images"][0]["url"], "http://localhost:3000/a.png");

        let response = get(&fx.state, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_conditional_get() {
        let fx = fixture(&[("a.png", b"abcdef")], "");
        let first = get(&fx.state, "/cdn/a.png").await;
        let etag = first.headers()[header::ETAG].to_str().unwrap().to_string();
        let last_modified = first.headers()[header::LAST_MODIFIED]
            .to_str()
            .unwrap()
            .to_string();

        let req = Request::builder()
            .uri("/cdn/a.png")
            .header("if-none-match", &etag)
            .body(())
            .unwrap();
        let response = send(&fx.state, req).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body(response).await.is_empty());

        let req = Request::builder()
            .uri("/cdn/a.png")
            .header("if-modified-since", &last_modified)
            .body(())
            .unwrap();
        assert_eq!(send(&fx.state, req).await.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_range_request() {
        let fx = fixture(&[("a.png", b"0123456789")], "");
        let req = Request::builder()
            .uri("/cdn/a.png")
            .header("range", "bytes=0-3")
            .body(())
            .unwrap();
        let response = send(&fx.state, req).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-3/10");
        assert_eq!(body(response).await.as_ref(), b"0123");

        let req = Request::builder()
            .uri("/cdn/a.png")
            .header("range", "bytes=50-")
            .body(())
            .unwrap();
        assert_eq!(
            send(&fx.state, req).await.status(),
            StatusCode::RANGE_NOT_SATISFIABLE
        );
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let fx = fixture(&[("a.png", b"0123456789")], "");
        let response = send(&fx.state, request(Method::HEAD, "/cdn/a.png")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert!(body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_range_reports_slice_length() {
        let fx = fixture(&[("a.png", b"0123456789")], "");
        let req = Request::builder()
            .method(Method::HEAD)
            .uri("/cdn/a.png")
            .header("range", "bytes=2-5")
            .body(())
            .unwrap();
        let response = send(&fx.state, req).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
        assert!(body(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_dotfiles_are_not_served() {
        let fx = fixture(&[(".env", b"SECRET=1"), (".htpasswd", b"admin:x")], "");
        for (uri, name) in [("/cdn/.env", ".env"), ("/cdn/.htpasswd", ".htpasswd")] {
            let response = get(&fx.state, uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            let json = json_body(response).await;
            assert_eq!(json["error"], "Image not found");
            assert_eq!(json["message"], format!("Image '{name}' does not exist"));
        }
    }

    #[tokio::test]
    async fn test_options_and_cors() {
        let fx = fixture(&[("a.png", b"x")], "[http]\nenable_cors = true");
        let response = send(&fx.state, request(Method::OPTIONS, "/cdn/a.png")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let response = get(&fx.state, "/cdn/a.png").await;
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_directory_name_is_not_found() {
        let fx = fixture(&[], "");
        std::fs::create_dir(fx.state.store.root().join("folder.png")).unwrap();
        let response = get(&fx.state, "/cdn/folder.png").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
