// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # basketeer Core
//!
//! Core types, models, and traits for the `basketeer` client.
//!
//! This crate provides the foundational abstractions used across all other
//! `basketeer` crates:
//!
//! - [`Payload`] - Field-sparse upstream payloads with safe accessors
//! - [`Warnings`] - Ordered, non-fatal warnings threaded through calls
//! - [`ResolvedItem`], [`ResolvedVenue`], [`BasketSummary`] - Typed views
//!   promoted from merged payloads
//! - [`Credentials`] and the [`ProfileStore`] trait for token durability
//! - [`CoreError`]

pub mod error;
pub mod models;
pub mod traits;

pub use error::CoreError;

pub use models::{
    payload, BasketSummary, Credentials, OptionGroup, OptionValue, Payload, ResolvedItem,
    ResolvedVenue, Warnings, FIELD_CURRENCY, FIELD_NAME, FIELD_OPTION_GROUPS, FIELD_PRICE,
};

pub use traits::ProfileStore;
