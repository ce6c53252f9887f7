//! Token rotation around upstream calls.
//!
//! [`AuthRotation::invoke`] wraps one logical operation. Before the call it
//! refreshes a token that is about to expire; after a 401 it refreshes once
//! and retries once. Rotated tokens are handed to the profile store. Both the
//! refresh and the save stop at cancellation.

use std::future::Future;
use std::time::Duration;

use basketeer_core::{ProfileStore, Warnings};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::TokenRefresher;
use crate::auth::AuthContext;
use crate::error::FetchError;

/// Default margin before expiry at which tokens are refreshed.
pub const DEFAULT_REFRESH_LEEWAY: Duration = Duration::from_secs(30);

/// Executes operations with automatic token refresh.
pub struct AuthRotation<'a> {
    refresher: &'a dyn TokenRefresher,
    store: Option<&'a dyn ProfileStore>,
    leeway: Duration,
    clock: fn() -> DateTime<Utc>,
    cancel: CancellationToken,
}

impl<'a> AuthRotation<'a> {
    /// Creates an invoker that refreshes through `refresher`.
    pub fn new(refresher: &'a dyn TokenRefresher) -> Self {
        Self {
            refresher,
            store: None,
            leeway: DEFAULT_REFRESH_LEEWAY,
            clock: Utc::now,
            cancel: CancellationToken::new(),
        }
    }

    /// Saves rotated tokens to `store`.
    pub fn with_store(mut self, store: &'a dyn ProfileStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the proactive refresh margin.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Overrides the clock used for expiry checks.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Aborts refreshes and saves once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `op` with the current credentials, keeping them fresh.
    ///
    /// - A token expiring within the leeway is refreshed first; a failure
    ///   there is recorded as a warning and the call proceeds.
    /// - A 401 without a refresh token is returned unchanged.
    /// - A 401 with a refresh token triggers one refresh and one retry. A
    ///   failed refresh yields [`FetchError::RefreshFailed`] wrapping the 401.
    /// - Cancellation during a refresh yields [`FetchError::Cancelled`].
    /// - Every other outcome is returned as is.
    pub async fn invoke<T, F, Fut>(
        &self,
        auth: &mut AuthContext,
        warnings: &mut Warnings,
        mut op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(AuthContext) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if auth.refresh().is_some() && auth.expires_within(self.leeway, (self.clock)()) {
            debug!("Access token near expiry, refreshing");
            match self.rotate(auth, warnings).await {
                Ok(()) => {}
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "Proactive token refresh failed");
                    warnings.push(format!("token refresh before expiry failed: {e}"));
                }
            }
        }

        let error = match op(auth.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_unauthorized() && auth.refresh().is_some() => e,
            Err(e) => return Err(e),
        };

        debug!("Upstream rejected the access token, refreshing");
        match self.rotate(auth, warnings).await {
            Ok(()) => {}
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(refresh_error) => {
                warn!(error = %refresh_error, "Token refresh after 401 failed");
                return Err(FetchError::RefreshFailed {
                    source: Box::new(error),
                    reason: refresh_error.to_string(),
                });
            }
        }

        op(auth.clone()).await
    }

    /// Refreshes the tokens now and saves them to the store, if any.
    ///
    /// A failed save is a warning; the rotated tokens stay in `auth`.
    pub async fn rotate(
        &self,
        auth: &mut AuthContext,
        warnings: &mut Warnings,
    ) -> Result<(), FetchError> {
        let rotated = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            rotated = self.refresher.refresh(auth) => rotated?,
        };
        auth.apply_rotation(rotated);
        info!("Access token refreshed");

        if let Some(store) = self.store {
            let credentials = auth.to_credentials();
            let saved = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                saved = store.save(&credentials) => saved,
            };
            if let Err(e) = saved {
                warn!(error = %e, "Failed to save refreshed credentials");
                warnings.push(format!("refreshed credentials could not be saved: {e}"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
