//! HTTP response building module
//!
//! Builders for every response the server emits. A builder failure is logged
//! and replaced by a bare fallback response instead of panicking.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use super::cache::CachePolicy;
use super::range::ByteRange;
use crate::error::CdnError;
use crate::logger;

pub type HttpResponse = Response<Full<Bytes>>;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Validators and caching directives attached to every file response
#[derive(Debug, Clone)]
pub struct FileHeaders<'a> {
    pub content_type: &'a str,
    pub etag: &'a str,
    pub last_modified: Option<&'a str>,
    pub cache: CachePolicy,
}

/// Build JSON response
///
/// JSON bodies (listing, info, errors) reflect the directory at request time
/// and are never cached.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let json = match serde_json::to_vec_pretty(body) {
        Ok(j) => j,
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            return fallback(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Internal server error"}"#,
            );
        }
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(header::CONTENT_LENGTH, json.len())
        .header(header::CACHE_CONTROL, CachePolicy::NoCache.to_header_value())
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status, "")
        })
}

/// Build the JSON error response for a request failure
pub fn build_error_response(err: &CdnError, available_routes: &Value) -> HttpResponse {
    json_response(err.status(), &err.to_body(available_routes))
}

/// Build 200 (whole file) or 206 (one range) file response
///
/// `Content-Length` comes from `total_size` or the range, not from `data`,
/// so a HEAD response can pass an empty body.
pub fn build_file_response(
    data: Bytes,
    total_size: u64,
    range: Option<ByteRange>,
    headers: &FileHeaders<'_>,
) -> HttpResponse {
    let content_length = range.map_or(total_size, ByteRange::len);
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, headers.content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, headers.etag)
        .header(header::CACHE_CONTROL, headers.cache.to_header_value());

    if let Some(last_modified) = headers.last_modified {
        builder = builder.header(header::LAST_MODIFIED, last_modified);
    }

    builder = match range {
        Some(range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, range.content_range(total_size)),
        None => builder.status(StatusCode::OK),
    };

    builder.body(Full::new(data)).unwrap_or_else(|e| {
        log_build_error("file", &e);
        fallback(StatusCode::INTERNAL_SERVER_ERROR, "")
    })
}

/// Build 304 Not Modified response
pub fn build_304_response(etag: &str, last_modified: Option<&str>, cache: CachePolicy) -> HttpResponse {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::ETAG, etag)
        .header(header::CACHE_CONTROL, cache.to_header_value());
    if let Some(last_modified) = last_modified {
        builder = builder.header(header::LAST_MODIFIED, last_modified);
    }
    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("304", &e);
        fallback(StatusCode::NOT_MODIFIED, "")
    })
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(total_size: u64) -> HttpResponse {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_RANGE, format!("bytes */{total_size}"))
        .body(Full::new(Bytes::from("Range Not Satisfiable")))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            fallback(StatusCode::RANGE_NOT_SATISFIABLE, "Range Not Satisfiable")
        })
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> HttpResponse {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ALLOW, ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS)
            .header(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                "Range, If-None-Match, If-Modified-Since",
            )
            .header(header::ACCESS_CONTROL_MAX_AGE, "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        fallback(StatusCode::NO_CONTENT, "")
    })
}

/// Stamp headers every response carries
pub fn apply_common_headers(response: &mut HttpResponse, server_name: &str, enable_cors: bool) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(server_name) {
        headers.insert(header::SERVER, value);
    }
    if enable_cors {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }
}

/// Drop the body of a HEAD response, keeping its headers (Content-Length included)
pub fn strip_body(response: HttpResponse) -> HttpResponse {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

fn fallback(status: StatusCode, body: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {status} response: {error}"));
}
