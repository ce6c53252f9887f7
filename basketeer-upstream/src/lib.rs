// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # basketeer Upstream
//!
//! HTTP implementation of [`basketeer_fetch::UpstreamApi`] for the consumer
//! delivery platform.
//!
//! - [`HttpUpstream`] - reqwest client applying per-call credentials
//! - [`Endpoints`] - Service base URLs and path construction
//! - [`response`] - Status classification and body parsing

pub mod client;
pub mod endpoints;
pub mod response;

pub use client::{DEFAULT_TIMEOUT, HttpUpstream};
pub use endpoints::Endpoints;
