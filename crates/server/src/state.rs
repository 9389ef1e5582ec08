//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::geocoding::GeocodingProvider;
use crate::services::{AddressLocationResolver, LocationResolver};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Collaborators are held as
/// trait objects so tests can swap in the in-memory store and a fake
/// provider.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    geocoding: Arc<dyn GeocodingProvider>,
    locations: Arc<dyn LocationResolver>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Site locations are resolved from the cached address.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn Store>,
        geocoding: Arc<dyn GeocodingProvider>,
    ) -> Self {
        let locations = Arc::new(AddressLocationResolver::new(Arc::clone(&store)));
        Self::with_locations(config, store, geocoding, locations)
    }

    /// Create application state with a custom location resolver.
    #[must_use]
    pub fn with_locations(
        config: ServerConfig,
        store: Arc<dyn Store>,
        geocoding: Arc<dyn GeocodingProvider>,
        locations: Arc<dyn LocationResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                geocoding,
                locations,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the persistent store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the geocoding provider.
    #[must_use]
    pub fn geocoding(&self) -> &dyn GeocodingProvider {
        self.inner.geocoding.as_ref()
    }

    /// Get a reference to the location resolver.
    #[must_use]
    pub fn locations(&self) -> &dyn LocationResolver {
        self.inner.locations.as_ref()
    }
}
