//! Upstream API boundary.
//!
//! The fetch core never talks HTTP itself. Everything goes through
//! [`UpstreamApi`], implemented over reqwest in `basketeer-upstream` and by
//! scripted mocks in tests.

use async_trait::async_trait;
use basketeer_core::Payload;

use crate::auth::{AuthContext, RotatedTokens};
use crate::error::FetchError;

/// Operations of the consumer platform's private API.
///
/// Every call receives the credentials to use explicitly; implementations
/// hold no auth state.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// One assortment category page, by venue and category slug.
    async fn category(
        &self,
        venue: &str,
        category: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError>;

    /// Items by identifier. Callers keep batches at or below the batch size.
    async fn items_batch(
        &self,
        venue: &str,
        item_ids: &[String],
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError>;

    /// The venue's assortment, full or partial.
    async fn assortment(
        &self,
        venue: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError>;

    /// One item by identifier.
    async fn item(
        &self,
        venue: &str,
        item_id: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError>;

    /// Static venue information.
    async fn venue(&self, venue: &str, auth: &AuthContext) -> Result<Payload, FetchError>;

    /// One page of venue content. `page_token` is `None` for the first page.
    async fn venue_content(
        &self,
        venue: &str,
        page_token: Option<&str>,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
        auth: &AuthContext,
    ) -> Result<RotatedTokens, FetchError>;

    /// Baskets of the signed-in user.
    async fn baskets(&self, auth: &AuthContext) -> Result<Payload, FetchError>;

    /// Deletes a whole basket.
    async fn delete_basket(&self, basket_id: &str, auth: &AuthContext) -> Result<(), FetchError>;
}

// ============================================================================
// Token Refresher
// ============================================================================

/// Capability to mint new tokens for an auth context.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Refreshes using the context's refresh token.
    async fn refresh(&self, auth: &AuthContext) -> Result<RotatedTokens, FetchError>;
}

/// [`TokenRefresher`] backed by the upstream token endpoint.
pub struct UpstreamRefresher<'a> {
    api: &'a dyn UpstreamApi,
}

impl<'a> UpstreamRefresher<'a> {
    /// Creates a refresher over `api`.
    pub fn new(api: &'a dyn UpstreamApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl TokenRefresher for UpstreamRefresher<'_> {
    async fn refresh(&self, auth: &AuthContext) -> Result<RotatedTokens, FetchError> {
        let refresh_token = auth.refresh().ok_or_else(|| {
            FetchError::MissingCredentials("no refresh token available".to_string())
        })?;
        self.api.refresh_access_token(refresh_token, auth).await
    }
}
