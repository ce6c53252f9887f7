// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # basketeer Fetch
//!
//! The resilient fetch core of `basketeer`.
//!
//! ## Credentials
//!
//! - [`token`] - Normalizes raw tokens and cookies in any supported encoding
//! - [`auth::AuthContext`] - Per-command bearer token, refresh token and cookies
//! - [`rotation::AuthRotation`] - Proactive and on-401 token refresh
//!
//! ## Calling the upstream
//!
//! - [`api::UpstreamApi`] - The upstream boundary
//! - [`retry::RetryPolicy`] - Transient-error retries with anonymous fallback
//! - [`context::FetchContext`] - Upstream, settings and cancellation
//!
//! ## Loading and resolving
//!
//! - [`catalog::CategoryLoader`] - Bounded category fan-out for partial assortments
//! - [`cascade::FallbackCascade`] - Ordered sources merged field by field
//! - [`resolve`] - Item and venue resolution on top of the cascade
//! - [`basket`] - Basket listing and removal
//!
//! ## Example
//!
//! ```ignore
//! use basketeer_fetch::{AuthRotation, FetchContext, UpstreamRefresher, resolve_item};
//!
//! let ctx = FetchContext::new(api);
//! let refresher = UpstreamRefresher::new(ctx.api.as_ref());
//! let rotation = AuthRotation::new(&refresher).with_store(&store);
//!
//! let mut warnings = Warnings::new();
//! let item = rotation
//!     .invoke(&mut auth, &mut warnings, |auth| async move {
//!         resolve_item(&ctx, &auth, "venue-slug", "item-id").await
//!     })
//!     .await?;
//! ```

pub mod api;
pub mod auth;
pub mod basket;
pub mod cascade;
pub mod catalog;
pub mod context;
pub mod error;
pub mod resolve;
pub mod retry;
pub mod rotation;
pub mod token;

#[cfg(test)]
mod testing;

// Errors
pub use error::{FetchError, UpstreamError};

// Credentials
pub use auth::{AuthContext, AuthSources, RotatedTokens};
pub use rotation::AuthRotation;

// Upstream boundary
pub use api::{TokenRefresher, UpstreamApi, UpstreamRefresher};
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use retry::{RetryOutcome, RetryPolicy};

// Loading and resolving
pub use basket::{list_baskets, remove_from_basket};
pub use cascade::{
    AttemptOutcome, CandidateSource, CascadeOutcome, FallbackCascade, SourceAttempt,
};
pub use catalog::{CategoryLoad, CategoryLoadResult, CategoryLoader, LoadStrategy, Menu, load_menu};
pub use resolve::{Resolution, Target, resolve_item, resolve_venue};
