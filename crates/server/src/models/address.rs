//! Cached address records.

use chrono::{DateTime, Utc};
use serde::Serialize;

use siteline_core::AddressId;

/// An address resolved from the geocoding provider.
///
/// Keyed by the provider's identifier and never modified after creation.
/// Every provider field is optional because the provider omits fields that
/// do not apply (e.g. `sub_building_name` for a detached house).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub formatted_address: Option<Vec<String>>,
    pub thoroughfare: Option<String>,
    pub building_name: Option<String>,
    pub sub_building_name: Option<String>,
    pub sub_building_number: Option<String>,
    pub building_number: Option<String>,
    pub line_one: Option<String>,
    pub line_two: Option<String>,
    pub line_three: Option<String>,
    pub line_four: Option<String>,
    pub postcode: Option<String>,
    pub locality: Option<String>,
    pub town_or_city: Option<String>,
    pub county: Option<String>,
    pub district: Option<String>,
    pub country: Option<String>,
    pub residential: Option<bool>,
    /// When the record was first cached.
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Single-line label for display, joining the non-empty formatted lines.
    #[must_use]
    pub fn label(&self) -> String {
        self.formatted_address
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
