//! MIME type detection module
//!
//! Returns the Content-Type for a file name based on its extension.

use crate::assets::name::extension_of;

/// Get MIME Content-Type based on a (case-insensitive) file extension
///
/// # Examples
/// ```
/// use imgcdn::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("png")), "image/png");
/// assert_eq!(get_content_type(Some("JPG")), "image/jpeg");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    let Some(ext) = extension else {
        return "application/octet-stream";
    };
    match ext.to_ascii_lowercase().as_str() {
        // Images
        "png" => "image/png",
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",

        // Things that tend to sit next to images
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",

        // Default
        _ => "application/octet-stream",
    }
}

/// Content-Type for a file name
pub fn content_type_for(name: &str) -> &'static str {
    get_content_type(extension_of(name).as_deref())
}
