//! Venue types promoted from merged payloads.

use serde::{Deserialize, Serialize};

use super::payload::Payload;

/// A venue after the fallback cascade committed to a merged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedVenue {
    /// Venue slug used in upstream URLs.
    pub slug: String,
    /// Upstream venue identifier.
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// ISO currency code used for prices.
    pub currency: Option<String>,
    /// ISO country code.
    pub country: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Whether the venue is currently accepting orders.
    pub online: Option<bool>,
}

impl ResolvedVenue {
    /// Promotes a merged payload into a typed venue.
    pub fn from_payload(slug: impl Into<String>, payload: &Payload) -> Self {
        let text = |key: &str| payload.get_str(key).map(str::to_string);
        Self {
            slug: slug.into(),
            id: text("id"),
            name: text("name"),
            currency: text("currency"),
            country: text("country"),
            address: text("address"),
            online: payload.get_bool("online"),
        }
    }

    /// True once name and currency are known.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.currency.is_some()
    }
}
