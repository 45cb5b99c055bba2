//! Directory listing service

use serde::Serialize;

use super::name::has_allowed_extension;
use super::store::AssetStore;
use crate::error::CdnError;

/// Knobs for one listing pass
#[derive(Debug, Clone, Copy)]
pub struct ListingOptions<'a> {
    /// Lower-case extensions without the leading dot
    pub extensions: &'a [String],
    /// Stat every entry and report its size
    pub include_size: bool,
}

/// One listed image
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AssetReference {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Listing response body
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub images: Vec<AssetReference>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl Listing {
    fn new(images: Vec<AssetReference>, server: Option<String>) -> Self {
        Self {
            count: images.len(),
            images,
            server,
        }
    }
}

/// Enumerate the store and build a reference for every allowed image
///
/// `link_base` is everything in front of the file name, e.g.
/// `http://localhost:3000/cdn`. Nothing is cached: every call reflects the
/// directory as it is now.
pub async fn list_assets(
    store: &AssetStore,
    link_base: &str,
    server: Option<&str>,
    options: ListingOptions<'_>,
) -> Result<Listing, CdnError> {
    let entries = store
        .entries(|name| has_allowed_extension(name, options.extensions))
        .await?;

    let mut images = Vec::with_capacity(entries.len());
    for entry in entries {
        let size = if options.include_size {
            match store.size_of(&entry).await {
                Some(size) => Some(size),
                // Removed between enumeration and stat
                None => continue,
            }
        } else {
            None
        };

        images.push(AssetReference {
            url: format!("{link_base}/{}", entry.name),
            name: entry.name,
            size,
        });
    }

    Ok(Listing::new(images, server.map(ToString::to_string)))
}
