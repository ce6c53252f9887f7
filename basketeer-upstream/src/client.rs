//! reqwest-backed implementation of the upstream API.

use std::time::Duration;

use async_trait::async_trait;
use basketeer_core::Payload;
use basketeer_fetch::{AuthContext, FetchError, RotatedTokens, UpstreamApi, UpstreamError};
use reqwest::{Client, Method, RequestBuilder, header};
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::endpoints::Endpoints;
use crate::response::{map_reqwest_error, read_payload, rotated_tokens};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// User agent sent with every request.
const USER_AGENT: &str = concat!("basketeer/", env!("CARGO_PKG_VERSION"));

/// Platform header some endpoints require.
const CLIENT_HEADER: &str = "platform";
const CLIENT_PLATFORM: &str = "Web";

#[derive(Serialize)]
struct ItemsBatchRequest<'a> {
    item_ids: &'a [String],
}

// ============================================================================
// HTTP Upstream
// ============================================================================

/// HTTP client for the consumer platform.
///
/// Holds no credentials; each call applies the [`AuthContext`] it is given.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    endpoints: Endpoints,
}

impl HttpUpstream {
    /// Creates a client for the default hosts.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_endpoints(Endpoints::default(), DEFAULT_TIMEOUT)
    }

    /// Creates a client for custom hosts and timeout.
    pub fn with_endpoints(endpoints: Endpoints, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, endpoints })
    }

    /// Returns the configured endpoints.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn request(&self, method: Method, url: Url, auth: &AuthContext) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .header(CLIENT_HEADER, CLIENT_PLATFORM);
        if let Some(authorization) = auth.authorization_header() {
            request = request.header(header::AUTHORIZATION, authorization);
        }
        if let Some(cookies) = auth.cookie_header() {
            request = request.header(header::COOKIE, cookies);
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> Result<Payload, FetchError> {
        let response = request.send().await.map_err(|e| map_reqwest_error(&e))?;
        debug!(status = %response.status(), url = %response.url(), "Response received");
        read_payload(response).await
    }

    async fn get(&self, url: Url, auth: &AuthContext) -> Result<Payload, FetchError> {
        debug!(url = %url, "GET request");
        self.send(self.request(Method::GET, url, auth)).await
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    #[instrument(skip(self, auth))]
    async fn category(
        &self,
        venue: &str,
        category: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.get(self.endpoints.category(venue, category, language)?, auth)
            .await
    }

    #[instrument(skip(self, item_ids, auth), fields(count = item_ids.len()))]
    async fn items_batch(
        &self,
        venue: &str,
        item_ids: &[String],
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        let url = self.endpoints.items_batch(venue, language)?;
        let request = self
            .request(Method::POST, url, auth)
            .json(&ItemsBatchRequest { item_ids });
        self.send(request).await
    }

    #[instrument(skip(self, auth))]
    async fn assortment(
        &self,
        venue: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.get(self.endpoints.assortment(venue, language)?, auth).await
    }

    #[instrument(skip(self, auth))]
    async fn item(
        &self,
        venue: &str,
        item_id: &str,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.get(self.endpoints.item(venue, item_id, language)?, auth)
            .await
    }

    #[instrument(skip(self, auth))]
    async fn venue(&self, venue: &str, auth: &AuthContext) -> Result<Payload, FetchError> {
        self.get(self.endpoints.venue(venue)?, auth).await
    }

    #[instrument(skip(self, auth))]
    async fn venue_content(
        &self,
        venue: &str,
        page_token: Option<&str>,
        language: &str,
        auth: &AuthContext,
    ) -> Result<Payload, FetchError> {
        self.get(self.endpoints.venue_content(venue, page_token, language)?, auth)
            .await
    }

    #[instrument(skip(self, refresh_token, auth))]
    async fn refresh_access_token(
        &self,
        refresh_token: &str,
        auth: &AuthContext,
    ) -> Result<RotatedTokens, FetchError> {
        let url = self.endpoints.access_token()?;
        // The token endpoint must not see the stale bearer token.
        let cookies_only = AuthContext::new(None, None, auth.cookies.clone());
        let request = self.request(Method::POST, url, &cookies_only).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);
        let payload = self.send(request).await?;
        rotated_tokens(&payload)
    }

    #[instrument(skip(self, auth))]
    async fn baskets(&self, auth: &AuthContext) -> Result<Payload, FetchError> {
        self.get(self.endpoints.baskets()?, auth).await
    }

    #[instrument(skip(self, auth))]
    async fn delete_basket(&self, basket_id: &str, auth: &AuthContext) -> Result<(), FetchError> {
        let url = self.endpoints.basket(basket_id)?;
        self.send(self.request(Method::DELETE, url, auth)).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers() {
        let upstream = HttpUpstream::new().unwrap();
        let auth = AuthContext::new(Some("a.b.c".into()), None, vec!["s=1".into()]);
        let url = upstream.endpoints().baskets().unwrap();

        let request = upstream.request(Method::GET, url, &auth).build().unwrap();
        let headers = request.headers();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer a.b.c");
        assert_eq!(headers[header::COOKIE], "s=1");
        assert_eq!(headers[CLIENT_HEADER], CLIENT_PLATFORM);
    }

    #[test]
    fn test_anonymous_request_has_no_auth_headers() {
        let upstream = HttpUpstream::new().unwrap();
        let url = upstream.endpoints().venue("deli").unwrap();

        let request = upstream
            .request(Method::GET, url, &AuthContext::anonymous())
            .build()
            .unwrap();
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        assert!(request.headers().get(header::COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let upstream = HttpUpstream::with_endpoints(
            Endpoints::single_host("http://127.0.0.1:9"),
            Duration::from_millis(500),
        )
        .unwrap();

        let err = upstream
            .venue("deli", &AuthContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status(), None);
    }
}
