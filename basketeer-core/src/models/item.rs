//! Item types promoted from merged payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::{as_i64, as_id, as_str, Payload};

/// Canonical key for an item's display name in merged payloads.
pub const FIELD_NAME: &str = "name";
/// Canonical key for an item's price in minor currency units.
pub const FIELD_PRICE: &str = "price";
/// Canonical key for an item's currency code.
pub const FIELD_CURRENCY: &str = "currency";
/// Canonical key for an item's option-group specifications.
pub const FIELD_OPTION_GROUPS: &str = "option_groups";

// ============================================================================
// Resolved Item
// ============================================================================

/// A single item after the fallback cascade committed to a merged view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedItem {
    /// Upstream item identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Price in minor currency units (e.g. cents).
    pub price: Option<i64>,
    /// ISO currency code.
    pub currency: Option<String>,
    /// Option groups the item can be configured with.
    pub option_groups: Vec<OptionGroup>,
}

impl ResolvedItem {
    /// Promotes a merged payload into a typed item.
    pub fn from_payload(id: impl Into<String>, payload: &Payload) -> Self {
        Self {
            id: id.into(),
            name: payload.get_str(FIELD_NAME).map(str::to_string),
            price: payload.get_i64(FIELD_PRICE).filter(|p| *p > 0),
            currency: payload.get_str(FIELD_CURRENCY).map(str::to_string),
            option_groups: payload
                .get_array(FIELD_OPTION_GROUPS)
                .iter()
                .filter_map(OptionGroup::from_value)
                .collect(),
        }
    }

    /// True when the item has a positive price and at least one option group.
    pub fn is_complete(&self) -> bool {
        self.price.is_some() && !self.option_groups.is_empty()
    }
}

// ============================================================================
// Option Groups
// ============================================================================

/// A group of choices for an item (size, toppings, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionGroup {
    /// Group identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Minimum number of selections.
    pub min: Option<i64>,
    /// Maximum number of selections.
    pub max: Option<i64>,
    /// Selectable values.
    pub values: Vec<OptionValue>,
}

impl OptionGroup {
    /// Reads an option group from any of the shapes the upstream uses.
    ///
    /// Requires an identifier; everything else is optional.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj
            .get("id")
            .or_else(|| obj.get("option_id"))
            .and_then(as_id)?;
        let name = obj
            .get("name")
            .or_else(|| obj.get("title"))
            .and_then(as_str)
            .map(str::to_string);

        let range = obj
            .get("multi_choice_config")
            .and_then(|c| c.get("total_range"));
        let min = obj
            .get("min")
            .or_else(|| obj.get("minimum"))
            .or_else(|| range.and_then(|r| r.get("min")))
            .and_then(as_i64);
        let max = obj
            .get("max")
            .or_else(|| obj.get("maximum"))
            .or_else(|| range.and_then(|r| r.get("max")))
            .and_then(as_i64);

        let values = ["values", "choices", "options"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map(|arr| arr.iter().filter_map(OptionValue::from_value).collect())
            .unwrap_or_default();

        Some(Self {
            id,
            name,
            min,
            max,
            values,
        })
    }
}

/// One selectable value inside an option group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    /// Value identifier.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Price delta in minor currency units.
    pub price: Option<i64>,
}

impl OptionValue {
    /// Reads an option value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: obj.get("id").and_then(as_id)?,
            name: obj
                .get("name")
                .or_else(|| obj.get("title"))
                .and_then(as_str)
                .map(str::to_string),
            price: obj.get("price").and_then(as_i64),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
