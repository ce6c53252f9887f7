//! Upstream hosts and URL construction.

use serde::{Deserialize, Serialize};
use url::Url;

use basketeer_fetch::{FetchError, UpstreamError};

/// Default consumer API host.
pub const DEFAULT_CONSUMER_API: &str = "https://consumer-api.wolt.com";
/// Default venue content host.
pub const DEFAULT_CONTENT_API: &str = "https://restaurant-api.wolt.com";
/// Default authentication host.
pub const DEFAULT_AUTH_API: &str = "https://authentication.wolt.com";

const ASSORTMENT_PREFIX: &[&str] = &["consumer-api", "consumer-assortment", "v1", "venues", "slug"];
const CONTENT_PREFIX: &[&str] = &["consumer-api", "venue-content-api", "v3", "web", "venue-content", "slug"];

// ============================================================================
// Endpoints
// ============================================================================

/// Base URLs of the three upstream services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Assortment, item, basket and content API.
    pub consumer_api: String,
    /// Static venue information API.
    pub content_api: String,
    /// Token API.
    pub auth_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            consumer_api: DEFAULT_CONSUMER_API.to_string(),
            content_api: DEFAULT_CONTENT_API.to_string(),
            auth_api: DEFAULT_AUTH_API.to_string(),
        }
    }
}

impl Endpoints {
    /// Points every service at one base URL. Used against local test servers.
    pub fn single_host(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            consumer_api: base.clone(),
            content_api: base.clone(),
            auth_api: base,
        }
    }

    /// Venue assortment.
    pub fn assortment(&self, venue: &str, language: &str) -> Result<Url, FetchError> {
        build(&self.consumer_api, ASSORTMENT_PREFIX, &[venue, "assortment"], &[("language", language)])
    }

    /// One assortment category.
    pub fn category(&self, venue: &str, category: &str, language: &str) -> Result<Url, FetchError> {
        build(
            &self.consumer_api,
            ASSORTMENT_PREFIX,
            &[venue, "assortment", "categories", "slug", category],
            &[("language", language)],
        )
    }

    /// Items-by-id batch. The ids travel in the request body.
    pub fn items_batch(&self, venue: &str, language: &str) -> Result<Url, FetchError> {
        build(
            &self.consumer_api,
            ASSORTMENT_PREFIX,
            &[venue, "assortment", "items"],
            &[("language", language)],
        )
    }

    /// One item.
    pub fn item(&self, venue: &str, item_id: &str, language: &str) -> Result<Url, FetchError> {
        build(
            &self.consumer_api,
            ASSORTMENT_PREFIX,
            &[venue, "assortment", "items", item_id],
            &[("language", language)],
        )
    }

    /// Static venue information.
    pub fn venue(&self, venue: &str) -> Result<Url, FetchError> {
        build(&self.content_api, &["v3", "venues", "slug"], &[venue], &[])
    }

    /// One page of venue content.
    pub fn venue_content(
        &self,
        venue: &str,
        page_token: Option<&str>,
        language: &str,
    ) -> Result<Url, FetchError> {
        let mut query = vec![("language", language)];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        build(&self.consumer_api, CONTENT_PREFIX, &[venue], &query)
    }

    /// Token refresh.
    pub fn access_token(&self) -> Result<Url, FetchError> {
        build(&self.auth_api, &["v1", "wauth2", "access_token"], &[], &[])
    }

    /// Basket list.
    pub fn baskets(&self) -> Result<Url, FetchError> {
        build(&self.consumer_api, &["order-xp", "web", "v1", "pages", "baskets"], &[], &[])
    }

    /// One basket.
    pub fn basket(&self, basket_id: &str) -> Result<Url, FetchError> {
        build(&self.consumer_api, &["order-xp", "v1", "baskets"], &[basket_id], &[])
    }
}

/// Joins `base`, fixed path segments, caller-supplied segments and a query.
///
/// Caller segments are percent-encoded, so slugs and ids can never change
/// the path structure.
fn build(base: &str, fixed: &[&str], dynamic: &[&str], query: &[(&str, &str)]) -> Result<Url, FetchError> {
    let mut url = Url::parse(base)
        .map_err(|e| UpstreamError::transport(format!("invalid base URL {base}: {e}")))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| UpstreamError::transport(format!("base URL {base} cannot have a path")))?;
        segments.pop_if_empty();
        segments.extend(fixed);
        segments.extend(dynamic);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
