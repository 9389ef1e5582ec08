//! Geocoding provider (getAddress.io) client.
//!
//! # Endpoints
//!
//! - `GET {base}/autocomplete/{postcode}?api-key=…` - suggestion list
//! - `GET {base}/get/{id}?api-key=…` - address detail
//!
//! Every request carries the configured timeout. Responses other than 2xx
//! are surfaced as [`GeocodingError::Api`]; nothing is retried.

pub mod types;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use siteline_core::AddressId;

use crate::config::GeocodingConfig;

pub use types::ProviderAddress;

/// Errors that can occur when calling the geocoding provider.
#[derive(Debug, Error)]
pub enum GeocodingError {
    /// HTTP request failed (connect error, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the provider response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The configured base URL cannot be joined with the request path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for GeocodingError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key.
        Self::Http(err.without_url())
    }
}

/// Outbound port to the geocoding provider.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Fetch autocomplete suggestions for a postcode fragment.
    ///
    /// The payload is returned verbatim.
    async fn autocomplete(&self, postcode: &str) -> Result<serde_json::Value, GeocodingError>;

    /// Fetch the detail record for a provider address identifier.
    async fn get_address(&self, id: &AddressId) -> Result<ProviderAddress, GeocodingError>;
}

/// getAddress.io HTTP client.
#[derive(Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl GeocodingClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
        })
    }

    /// Build `{base}/{endpoint}/{segment}?api-key=…` with the segment
    /// percent-encoded.
    fn endpoint_url(&self, endpoint: &str, segment: &str) -> Result<Url, GeocodingError> {
        let mut url = Url::parse(&format!(
            "{}/{endpoint}/{}",
            self.base_url,
            urlencoding::encode(segment)
        ))?;
        url.query_pairs_mut()
            .append_pair("api-key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, GeocodingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeocodingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeocodingError::Parse(e.without_url().to_string()))
    }
}

#[async_trait]
impl GeocodingProvider for GeocodingClient {
    #[instrument(skip(self))]
    async fn autocomplete(&self, postcode: &str) -> Result<serde_json::Value, GeocodingError> {
        let url = self.endpoint_url("autocomplete", postcode)?;
        let payload = self.get_json(url).await?;
        debug!("Autocomplete lookup succeeded");
        Ok(payload)
    }

    #[instrument(skip(self), fields(address_id = %id))]
    async fn get_address(&self, id: &AddressId) -> Result<ProviderAddress, GeocodingError> {
        let url = self.endpoint_url("get", id.as_str())?;
        let address = self.get_json(url).await?;
        debug!("Address detail lookup succeeded");
        Ok(address)
    }
}
