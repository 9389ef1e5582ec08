//! Provider response types and their mapping to [`Address`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use siteline_core::AddressId;

use crate::models::Address;

/// Address detail as returned by `GET /get/{id}`.
///
/// Every field is optional: the provider omits or nulls fields that do not
/// apply, and unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderAddress {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub formatted_address: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thoroughfare: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub building_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub_building_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub_building_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub building_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub line_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub line_2: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub line_3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub line_4: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub postcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub locality: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub town_or_city: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub county: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(default)]
    pub residential: Option<bool>,
}

impl ProviderAddress {
    /// Map the provider record onto the canonical address shape (1:1 rename).
    #[must_use]
    pub fn into_address(self, id: AddressId, created_at: DateTime<Utc>) -> Address {
        Address {
            id,
            latitude: self.latitude,
            longitude: self.longitude,
            formatted_address: self.formatted_address,
            thoroughfare: self.thoroughfare,
            building_name: self.building_name,
            sub_building_name: self.sub_building_name,
            sub_building_number: self.sub_building_number,
            building_number: self.building_number,
            line_one: self.line_1,
            line_two: self.line_2,
            line_three: self.line_3,
            line_four: self.line_4,
            postcode: self.postcode,
            locality: self.locality,
            town_or_city: self.town_or_city,
            county: self.county,
            district: self.district,
            country: self.country,
            residential: self.residential,
            created_at,
        }
    }
}

/// Accept strings, numbers or null for textual fields.
///
/// Building numbers in particular arrive as either `"10"` or `10`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
