//! Static file transfer
//!
//! Sends a file that already passed the existence gate: conditional
//! requests, byte ranges, MIME detection and caching headers.

use std::io;

use hyper::body::Bytes;

use crate::assets::AssetFile;
use crate::config::AppState;
use crate::error::CdnError;
use crate::handler::router::RequestContext;
use crate::http::cache::{self, CachePolicy};
use crate::http::{self, mime, ByteRange, FileHeaders, HttpResponse, RangeOutcome};

/// Transfer `file` to the client
pub async fn serve_file(
    ctx: &RequestContext,
    state: &AppState,
    file: AssetFile,
) -> Result<HttpResponse, CdnError> {
    let modified = file.metadata.modified().ok();
    let etag = cache::generate_etag(file.metadata.len(), modified);
    let last_modified = modified.map(cache::format_http_date);
    let policy = CachePolicy::Public(state.config.http.cache_max_age);

    // Check if client has cached version
    if cache::is_fresh(
        ctx.if_none_match.as_deref(),
        ctx.if_modified_since.as_deref(),
        &etag,
        modified,
    ) {
        return Ok(http::build_304_response(&etag, last_modified.as_deref(), policy));
    }

    let total = file.metadata.len();
    let range = match http::parse_range_header(ctx.range_header.as_deref(), total) {
        RangeOutcome::Full => None,
        RangeOutcome::Partial(range) => Some(range),
        RangeOutcome::Unsatisfiable => return Ok(http::build_416_response(total)),
    };

    let headers = FileHeaders {
        content_type: mime::content_type_for(&file.name),
        etag: &etag,
        last_modified: last_modified.as_deref(),
        cache: policy,
    };

    // HEAD only needs the metadata
    if ctx.is_head() {
        return Ok(http::build_file_response(Bytes::new(), total, range, &headers));
    }

    let data = state
        .store
        .read(&file, range)
        .await
        .map_err(|e| read_error(&file, &e))?;

    // Content-Length is already fixed from the metadata
    let expected = range.map_or(total, ByteRange::len);
    if data.len() as u64 != expected {
        return Err(CdnError::Internal(format!(
            "'{}' changed while reading: {} of {expected} bytes",
            file.path.display(),
            data.len()
        )));
    }

    Ok(http::build_file_response(Bytes::from(data), total, range, &headers))
}

/// A file can still disappear between the gate and the read
fn read_error(file: &AssetFile, err: &io::Error) -> CdnError {
    if err.kind() == io::ErrorKind::NotFound {
        CdnError::not_found(&file.name)
    } else {
        CdnError::Internal(format!("reading '{}': {err}", file.path.display()))
    }
}
