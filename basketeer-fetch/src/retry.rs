//! Retry classification and the per-endpoint retry loop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::auth::AuthContext;
use crate::error::FetchError;

/// Longest server-requested cool-down that is honored.
pub const MAX_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(10);

// ============================================================================
// Retry Outcome
// ============================================================================

/// Whether a failed upstream call is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Transient failure: no status, 429, or 5xx.
    Retry,
    /// Any other status.
    Terminal,
}

impl RetryOutcome {
    /// Classifies an HTTP status. `None` means no response was received.
    pub fn classify(status: Option<u16>) -> Self {
        match status {
            None | Some(429) => Self::Retry,
            Some(s) if s >= 500 => Self::Retry,
            Some(_) => Self::Terminal,
        }
    }

    /// Classifies a fetch error. Only upstream failures can be retried.
    pub fn for_error(error: &FetchError) -> Self {
        match error {
            FetchError::Upstream(e) => Self::classify(e.status()),
            _ => Self::Terminal,
        }
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry loop settings for a single upstream endpoint.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per credential candidate.
    pub attempts_per_candidate: u32,
    /// Pause between attempts.
    pub pause: Duration,
    /// Pause after a 429 without a `Retry-After` header.
    pub rate_limit_cooldown: Duration,
    /// Whether a credentialed call falls back to an anonymous one.
    pub anonymous_fallback: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_candidate: 2,
            pause: Duration::from_millis(120),
            rate_limit_cooldown: Duration::from_secs(1),
            anonymous_fallback: true,
        }
    }
}

impl RetryPolicy {
    /// Disables retries and the anonymous fallback.
    pub fn no_retry() -> Self {
        Self {
            attempts_per_candidate: 1,
            pause: Duration::ZERO,
            rate_limit_cooldown: Duration::ZERO,
            anonymous_fallback: false,
        }
    }

    /// Sets the pause between attempts.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Sets the default 429 cool-down.
    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    /// Enables or disables the anonymous fallback.
    pub fn with_anonymous_fallback(mut self, enabled: bool) -> Self {
        self.anonymous_fallback = enabled;
        self
    }

    /// Returns how long to wait before retrying after `error`.
    pub fn delay_for(&self, error: &FetchError) -> Duration {
        if error.status() == Some(429) {
            error
                .retry_after()
                .unwrap_or(self.rate_limit_cooldown)
                .min(MAX_RATE_LIMIT_COOLDOWN)
        } else {
            self.pause
        }
    }

    /// Credential candidates tried in order for one call.
    pub fn candidates(&self, auth: &AuthContext) -> Vec<AuthContext> {
        let mut candidates = vec![auth.clone()];
        if self.anonymous_fallback && auth.has_credentials() {
            candidates.push(AuthContext::anonymous());
        }
        candidates
    }

    /// Runs `op` under the retry policy.
    ///
    /// Each candidate gets up to `attempts_per_candidate` attempts; a
    /// terminal error moves on to the next candidate. When every candidate
    /// fails, the error seen with the supplied context is returned.
    pub async fn execute<T, F, Fut>(
        &self,
        auth: &AuthContext,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(AuthContext) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.attempts_per_candidate.max(1);
        let mut first_error: Option<FetchError> = None;

        for (candidate_index, candidate) in self.candidates(auth).into_iter().enumerate() {
            let mut last_error = None;

            for attempt in 1..=attempts {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }

                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(FetchError::Cancelled),
                    result = op(candidate.clone()) => result,
                };

                let error = match result {
                    Ok(value) => return Ok(value),
                    Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                    Err(e) => e,
                };

                let outcome = RetryOutcome::for_error(&error);
                debug!(
                    candidate = candidate_index,
                    attempt,
                    status = error.status().unwrap_or(0),
                    ?outcome,
                    "Upstream attempt failed"
                );

                let delay = self.delay_for(&error);
                last_error = Some(error);

                if outcome == RetryOutcome::Terminal || attempt == attempts {
                    break;
                }
                pause(delay, cancel).await?;
            }

            if first_error.is_none() {
                first_error = last_error;
            }
        }

        Err(first_error
            .unwrap_or_else(|| FetchError::InvalidResponse("no attempt was made".to_string())))
    }
}

/// Sleeps for `duration`, returning early with [`FetchError::Cancelled`].
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(FetchError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn upstream(status: u16) -> FetchError {
        FetchError::Upstream(UpstreamError::new(status, "test"))
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::default()
            .with_pause(Duration::ZERO)
            .with_rate_limit_cooldown(Duration::ZERO)
    }

    fn credentialed() -> AuthContext {
        AuthContext::new(Some("a.b.c".into()), None, vec![])
    }

    #[test]
    fn test_classify() {
        assert_eq!(RetryOutcome::classify(None), RetryOutcome::Retry);
        assert_eq!(RetryOutcome::classify(Some(429)), RetryOutcome::Retry);
        assert_eq!(RetryOutcome::classify(Some(500)), RetryOutcome::Retry);
        assert_eq!(RetryOutcome::classify(Some(503)), RetryOutcome::Retry);
        for status in [400, 401, 403, 404, 410] {
            assert_eq!(RetryOutcome::classify(Some(status)), RetryOutcome::Terminal);
        }
        assert_eq!(
            RetryOutcome::for_error(&FetchError::NotFound("x".into())),
            RetryOutcome::Terminal
        );
    }

    #[test]
    fn test_rate_limit_delay_is_capped() {
        let policy = RetryPolicy::default();
        let limited = FetchError::Upstream(
            UpstreamError::new(429, "slow down").with_retry_after(Some(Duration::from_secs(120))),
        );
        assert_eq!(policy.delay_for(&limited), MAX_RATE_LIMIT_COOLDOWN);
        assert_eq!(policy.delay_for(&upstream(429)), Duration::from_secs(1));
        assert_eq!(policy.delay_for(&upstream(503)), Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_transient_error_retried_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .execute(&credentialed(), &CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n == 0 { Err(upstream(503)) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_error_falls_back_to_anonymous() {
        let seen = Mutex::new(Vec::new());
        let result = fast()
            .execute(&credentialed(), &CancellationToken::new(), |auth| {
                let anonymous = !auth.has_credentials();
                seen.lock().unwrap().push(anonymous);
                async move { if anonymous { Ok("public") } else { Err(upstream(403)) } }
            })
            .await;

        assert_eq!(result.unwrap(), "public");
        // One credentialed attempt (terminal), then the anonymous one.
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }

    #[tokio::test]
    async fn test_anonymous_context_has_single_candidate() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .execute(&AuthContext::anonymous(), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(upstream(500)) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_returns_supplied_context_error() {
        let result: Result<(), _> = fast()
            .execute(&credentialed(), &CancellationToken::new(), |auth| {
                let status = if auth.has_credentials() { 401 } else { 403 };
                async move { Err(upstream(status)) }
            })
            .await;

        assert!(result.unwrap_err().is_unauthorized());
    }

    #[tokio::test]
    async fn test_cancelled_during_cooldown() {
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::default().with_rate_limit_cooldown(Duration::from_secs(3600));
        let trigger = cancel.clone();

        let result: Result<(), _> = policy
            .execute(&AuthContext::anonymous(), &cancel, |_| {
                trigger.cancel();
                async { Err(upstream(429)) }
            })
            .await;

        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
