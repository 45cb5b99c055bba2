//! Image asset domain
//!
//! Name validation, the filesystem accessor with its existence gate, and the
//! listing service. Nothing here knows about HTTP.

pub mod listing;
pub mod name;
pub mod store;

pub use listing::{list_assets, AssetReference, Listing, ListingOptions};
pub use name::{decode_name, validate_name};
pub use store::{AssetFile, AssetStore};
