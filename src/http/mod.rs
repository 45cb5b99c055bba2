//! HTTP protocol layer module
//!
//! Cache validators, MIME detection, Range parsing and response builders,
//! decoupled from routing and from the asset directory.

pub mod cache;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeOutcome};
pub use response::{
    apply_common_headers, build_304_response, build_416_response, build_error_response,
    build_file_response, build_options_response, json_response, strip_body, FileHeaders,
    HttpResponse,
};
