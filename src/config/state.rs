// Application state module
// Immutable per-process state shared by every connection

use std::sync::Arc;

use super::types::Config;
use crate::assets::{AssetStore, ListingOptions};

/// Application state
///
/// Built once from [`Config`] and shared behind an `Arc`. Nothing in here is
/// mutated after startup; the asset directory itself is the only shared
/// resource and it is only ever read.
pub struct AppState {
    pub config: Config,
    pub store: AssetStore,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let store = AssetStore::new(&config.assets.root_dir);
        Arc::new(Self { config, store })
    }

    /// Listing options derived from the assets section
    pub fn listing_options(&self) -> ListingOptions<'_> {
        ListingOptions {
            extensions: &self.config.assets.extensions,
            include_size: self.config.assets.include_size,
        }
    }
}
