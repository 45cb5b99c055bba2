//! HTTP cache validation module
//!
//! `ETag` / `Last-Modified` generation and conditional request evaluation.
//! Validators come from file metadata, so a 304 never needs the file body.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};

/// IMF-fixdate, the only format emitted and the preferred one accepted
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Weak `ETag` from size and modification time, e.g. `W/"1a2b-18c9f0e1a20"`
pub fn generate_etag(len: u64, modified: Option<SystemTime>) -> String {
    let mtime_ms = modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis());
    format!("W/\"{len:x}-{mtime_ms:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single tag, a comma-separated list, and `*`. Comparison is
/// weak: a `W/` prefix on either side is ignored.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = strip_weak(etag);
    if_none_match.is_some_and(|client| {
        client.split(',').map(str::trim).any(|tag| tag == "*" || strip_weak(tag) == ours)
    })
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

/// `Last-Modified` header value, truncated to whole seconds
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Whether the resource is unchanged since the client's `If-Modified-Since`
///
/// Unparseable dates count as "modified" so the full body is sent.
pub fn not_modified_since(if_modified_since: Option<&str>, modified: Option<SystemTime>) -> bool {
    let (Some(since), Some(modified)) = (if_modified_since.and_then(parse_http_date), modified)
    else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}

/// Decide whether a conditional GET can be answered with 304
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when the client sent no entity tags.
pub fn is_fresh(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    etag: &str,
    modified: Option<SystemTime>,
) -> bool {
    if if_none_match.is_some() {
        return check_etag_match(if_none_match, etag);
    }
    not_modified_since(if_modified_since, modified)
}

/// Cache-Control policy for a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// No cache
    NoCache,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
        }
    }
}
