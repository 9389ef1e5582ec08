//! Address lookup gateway.
//!
//! Proxies postcode autocomplete to the geocoding provider and caches
//! address detail lookups by provider identifier (skip-if-exists).

use chrono::Utc;
use tracing::{info, instrument};

use siteline_core::AddressId;

use crate::db::Store;
use crate::error::AppError;
use crate::geocoding::GeocodingProvider;
use crate::models::Address;

/// Result of resolving an address identifier.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// The address was already cached; nothing was fetched or written.
    AlreadyCached,
    /// The address was fetched from the provider and stored.
    Created(Address),
}

impl ResolveOutcome {
    /// Whether this call wrote a new record.
    #[must_use]
    pub const fn created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Address lookup gateway.
pub struct AddressGateway<'a> {
    provider: &'a dyn GeocodingProvider,
    store: &'a dyn Store,
}

impl<'a> AddressGateway<'a> {
    /// Create a new gateway.
    #[must_use]
    pub const fn new(provider: &'a dyn GeocodingProvider, store: &'a dyn Store) -> Self {
        Self { provider, store }
    }

    /// Fetch autocomplete suggestions for a postcode fragment.
    ///
    /// Always round-trips to the provider; the payload is returned verbatim.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank postcode and
    /// `AppError::Upstream` if the provider call fails.
    #[instrument(skip(self))]
    pub async fn autocomplete(&self, postcode: &str) -> Result<serde_json::Value, AppError> {
        let postcode = postcode.trim();
        if postcode.is_empty() {
            return Err(AppError::BadRequest("postcode cannot be empty".to_string()));
        }

        Ok(self.provider.autocomplete(postcode).await?)
    }

    /// Ensure the address with this provider identifier is cached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank identifier,
    /// `AppError::Upstream` if the provider call fails, and
    /// `AppError::Database` if the store fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn resolve(&self, id: &AddressId) -> Result<ResolveOutcome, AppError> {
        if id.as_str().trim().is_empty() {
            return Err(AppError::BadRequest("address id cannot be empty".to_string()));
        }

        if self.store.address_exists(id).await? {
            return Ok(ResolveOutcome::AlreadyCached);
        }

        let provider_address = self.provider.get_address(id).await?;
        let address = provider_address.into_address(id.clone(), Utc::now());

        if self.store.insert_address(&address).await? {
            info!(postcode = address.postcode.as_deref(), "Cached address");
            Ok(ResolveOutcome::Created(address))
        } else {
            // Lost a race with a concurrent resolve of the same identifier.
            Ok(ResolveOutcome::AlreadyCached)
        }
    }
}
