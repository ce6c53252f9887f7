//! Domain models for basketeer.
//!
//! ## Submodules
//!
//! - [`payload`] - Field-sparse upstream payloads and safe accessors
//! - [`warnings`] - Accumulated non-fatal warnings
//! - [`item`] - Resolved items and option groups
//! - [`venue`] - Resolved venues
//! - [`basket`] - Basket summaries
//! - [`credentials`] - Stored credential bundle

mod basket;
mod credentials;
mod item;
pub mod payload;
mod venue;
mod warnings;

pub use basket::BasketSummary;
pub use credentials::Credentials;
pub use item::{
    OptionGroup, OptionValue, ResolvedItem, FIELD_CURRENCY, FIELD_NAME, FIELD_OPTION_GROUPS,
    FIELD_PRICE,
};
pub use payload::Payload;
pub use venue::ResolvedVenue;
pub use warnings::Warnings;
