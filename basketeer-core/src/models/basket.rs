//! Basket summaries.

use serde::{Deserialize, Serialize};

use super::payload::{as_i64, as_id, Payload};

/// A basket as listed by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketSummary {
    /// Basket identifier.
    pub id: String,
    /// Venue the basket belongs to.
    pub venue: Option<String>,
    /// Identifiers of the basket lines.
    pub item_ids: Vec<String>,
    /// Total in minor currency units.
    pub total: Option<i64>,
    /// ISO currency code.
    pub currency: Option<String>,
}

impl BasketSummary {
    /// Reads a basket from a payload. Requires an identifier.
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        let id = payload.get("id").and_then(as_id)?;
        let venue = payload
            .get_path(&["venue", "slug"])
            .and_then(as_id)
            .or_else(|| payload.get("venue_slug").and_then(as_id));
        let item_ids = payload
            .get_array("items")
            .iter()
            .filter_map(|item| item.get("id").and_then(as_id))
            .collect();
        let total = payload.get_i64("total").or_else(|| {
            payload
                .get_path(&["total", "amount"])
                .and_then(as_i64)
        });

        Some(Self {
            id,
            venue,
            item_ids,
            total,
            currency: payload.get_str("currency").map(str::to_string),
        })
    }

    /// Number of lines in the basket.
    pub fn item_count(&self) -> usize {
        self.item_ids.len()
    }
}
