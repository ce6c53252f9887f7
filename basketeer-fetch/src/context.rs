//! Fetch context shared by every operation of one command.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::UpstreamApi;
use crate::auth::AuthContext;
use crate::error::FetchError;
use crate::retry::RetryPolicy;

/// Default language for localized upstream content.
pub const DEFAULT_LANGUAGE: &str = "en";

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Language requested from localized endpoints.
    pub language: String,
    /// Retry loop for individual upstream calls.
    pub retry: RetryPolicy,
    /// Upper bound on parallel category workers.
    pub max_workers: usize,
    /// Identifiers per items-batch request.
    pub items_batch_size: usize,
    /// Venue content pages followed by the fallback cascade.
    pub content_page_limit: usize,
    /// Margin before expiry at which a token is refreshed proactively.
    pub refresh_leeway: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            retry: RetryPolicy::default(),
            max_workers: 8,
            items_batch_size: 80,
            content_page_limit: 3,
            refresh_leeway: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Upstream access, settings and cancellation for one command invocation.
pub struct FetchContext {
    /// Upstream API implementation.
    pub api: Arc<dyn UpstreamApi>,
    /// Fetch settings.
    pub settings: FetchSettings,
    /// Cancels every in-flight call and pause.
    pub cancel: CancellationToken,
}

impl FetchContext {
    /// Creates a context with default settings.
    pub fn new(api: Arc<dyn UpstreamApi>) -> Self {
        Self::builder(api).build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder(api: Arc<dyn UpstreamApi>) -> FetchContextBuilder {
        FetchContextBuilder::new(api)
    }

    /// Returns the configured language.
    pub fn language(&self) -> &str {
        &self.settings.language
    }

    /// Runs one upstream call through the retry policy.
    pub async fn call<T, F, Fut>(&self, auth: &AuthContext, op: F) -> Result<T, FetchError>
    where
        F: FnMut(AuthContext) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        self.settings.retry.execute(auth, &self.cancel, op).await
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
pub struct FetchContextBuilder {
    api: Arc<dyn UpstreamApi>,
    settings: FetchSettings,
    cancel: Option<CancellationToken>,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new(api: Arc<dyn UpstreamApi>) -> Self {
        Self {
            api,
            settings: FetchSettings::default(),
            cancel: None,
        }
    }

    /// Sets the fetch settings.
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the language.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.settings.language = language.into();
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.settings.retry = retry;
        self
    }

    /// Sets the worker bound for parallel category loads.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.settings.max_workers = workers.max(1);
        self
    }

    /// Sets the cancellation token.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> FetchContext {
        FetchContext {
            api: self.api,
            settings: self.settings,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockUpstream;

    #[test]
    fn test_default_settings() {
        let settings = FetchSettings::default();
        assert_eq!(settings.max_workers, 8);
        assert_eq!(settings.items_batch_size, 80);
        assert_eq!(settings.content_page_limit, 3);
        assert_eq!(settings.refresh_leeway, Duration::from_secs(30));
        assert_eq!(settings.retry.attempts_per_candidate, 2);
    }

    #[test]
    fn test_context_builder() {
        let cancel = CancellationToken::new();
        let ctx = FetchContext::builder(Arc::new(MockUpstream::new()))
            .language("fi")
            .max_workers(0)
            .cancel(cancel.clone())
            .build();

        assert_eq!(ctx.language(), "fi");
        assert_eq!(ctx.settings.max_workers, 1);
        cancel.cancel();
        assert!(ctx.cancel.is_cancelled());
    }
}
