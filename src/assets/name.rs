//! Asset name validation
//!
//! A name is a single path component. Anything that could address a parent
//! or nested path is rejected before the filesystem is consulted.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::error::CdnError;

/// Accept `name` only if it cannot leave the asset directory
///
/// Rejects `..`, `/`, `\` and NUL. Empty names never reach here; the router
/// treats an empty segment as a different route.
pub fn validate_name(name: &str) -> Result<&str, CdnError> {
    if name.contains("..") || name.contains(['/', '\\', '\0']) {
        return Err(CdnError::invalid_name(name));
    }
    Ok(name)
}

/// Percent-decode a raw URL segment into a candidate name
///
/// Decoding happens before validation so `..%2F` is caught as well.
pub fn decode_name(raw: &str) -> Result<Cow<'_, str>, CdnError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| CdnError::invalid_name(raw))
}

/// Lower-cased extension of `name`, if it has one
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether `name` carries one of the allowed (lower-case) extensions
pub fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    extension_of(name).is_some_and(|ext| allowed.iter().any(|a| *a == ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_accepted() {
        assert_eq!(validate_name("cat.png").unwrap(), "cat.png");
        assert!(validate_name("my image (1).JPG").is_ok());
        assert!(validate_name(".hidden").is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        for name in ["..", "../etc/passwd", "../../etc/passwd", "a..b", "x/y.png", "x\\y.png", "/abs"] {
            assert!(
                matches!(validate_name(name), Err(CdnError::InvalidName { .. })),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_nul_rejected() {
        assert!(validate_name("a\0.png").is_err());
    }

    #[test]
    fn test_decode_then_validate() {
        let decoded = decode_name("..%2F..%2Fetc%2Fpasswd").unwrap();
        assert_eq!(decoded, "../../etc/passwd");
        assert!(validate_name(&decoded).is_err());

        let decoded = decode_name("my%20cat.png").unwrap();
        assert_eq!(validate_name(&decoded).unwrap(), "my cat.png");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(matches!(
            decode_name("%FF%FE.png"),
            Err(CdnError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension_of("a.PNG").as_deref(), Some("png"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".png"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn test_allow_list_case_insensitive() {
        let allowed = vec!["png".to_string(), "jpg".to_string()];
        assert!(has_allowed_extension("c.JPG", &allowed));
        assert!(has_allowed_extension("a.png", &allowed));
        assert!(!has_allowed_extension("b.txt", &allowed));
        assert!(!has_allowed_extension("png", &allowed));
    }
}
