//! Request handler module
//!
//! Routing dispatch plus the static file transfer it delegates to.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
