//! Per-call authentication context.

use std::fmt;
use std::time::Duration;

use basketeer_core::Credentials;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::token::{
    extract_access_token, extract_refresh_token, normalize_access_token, normalize_refresh_token,
    token_expiry,
};

// ============================================================================
// Auth Context
// ============================================================================

/// Credentials used for one command invocation.
///
/// Built fresh per command from flags, the stored profile and cookies. Only a
/// successful token refresh mutates it (see [`crate::rotation`]).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// Bearer token sent in the `Authorization` header.
    pub bearer_token: Option<String>,
    /// Refresh token used to mint a new bearer token.
    pub refresh_token: Option<String>,
    /// Cookie headers forwarded with every request.
    pub cookies: Vec<String>,
}

impl AuthContext {
    /// Creates a context from already-normalized parts.
    pub fn new(
        bearer_token: Option<String>,
        refresh_token: Option<String>,
        cookies: Vec<String>,
    ) -> Self {
        Self {
            bearer_token: non_empty(bearer_token),
            refresh_token: non_empty(refresh_token),
            cookies: cookies.into_iter().filter(|c| !c.trim().is_empty()).collect(),
        }
    }

    /// A context with no credentials at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// True iff a bearer token or at least one cookie is present.
    pub fn has_credentials(&self) -> bool {
        self.bearer().is_some() || !self.cookies.is_empty()
    }

    /// Returns the bearer token, if non-empty.
    pub fn bearer(&self) -> Option<&str> {
        self.bearer_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns the refresh token, if non-empty.
    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> Option<String> {
        self.bearer().map(|t| format!("Bearer {t}"))
    }

    /// Value for the `Cookie` header.
    pub fn cookie_header(&self) -> Option<String> {
        (!self.cookies.is_empty()).then(|| self.cookies.join("; "))
    }

    /// Expiry of the bearer token, when it carries an `exp` claim.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.bearer().and_then(token_expiry)
    }

    /// True if the bearer token expires within `leeway` of `now`.
    ///
    /// Tokens without a known expiry never count as expiring.
    pub fn expires_within(&self, leeway: Duration, now: DateTime<Utc>) -> bool {
        let Some(expires_at) = self.expires_at() else {
            return false;
        };
        let leeway = chrono::Duration::from_std(leeway).unwrap_or_else(|_| chrono::Duration::zero());
        expires_at <= now + leeway
    }

    /// Replaces the tokens after a successful refresh.
    ///
    /// A rotation without a new refresh token keeps the current one.
    pub fn apply_rotation(&mut self, rotated: RotatedTokens) {
        self.bearer_token = Some(rotated.access_token);
        if let Some(refresh) = non_empty(rotated.refresh_token) {
            self.refresh_token = Some(refresh);
        }
    }

    /// Snapshot of the context for a profile store.
    pub fn to_credentials(&self) -> Credentials {
        Credentials {
            access_token: self.bearer_token.clone(),
            refresh_token: self.refresh_token.clone(),
            cookies: self.cookies.clone(),
            updated_at: Some(Utc::now()),
        }
    }

    /// Merges credential sources into a context.
    ///
    /// Precedence per field: explicit flag, then the stored profile, then
    /// whatever can be extracted from cookies. Every token passes through
    /// the normalizer, so any supported encoding is accepted.
    pub fn resolve(sources: &AuthSources<'_>) -> Self {
        let cookies: Vec<String> = if sources.cookies.is_empty() {
            sources
                .profile
                .map(|p| p.cookies.clone())
                .unwrap_or_default()
        } else {
            sources.cookies.to_vec()
        };

        let profile_access = sources.profile.and_then(|p| p.access_token.as_deref());
        let profile_refresh = sources.profile.and_then(|p| p.refresh_token.as_deref());

        let (bearer_token, bearer_source) = if let Some(raw) = present(sources.token) {
            (Some(normalize_access_token(raw)), "flag")
        } else if let Some(raw) = present(profile_access) {
            (Some(normalize_access_token(raw)), "profile")
        } else {
            (extract_access_token("", &cookies), "cookies")
        };

        let refresh_token = present(sources.refresh_token)
            .map(normalize_refresh_token)
            .or_else(|| present(sources.token).and_then(|raw| extract_refresh_token(raw, &[])))
            .or_else(|| present(profile_refresh).map(normalize_refresh_token))
            .or_else(|| extract_refresh_token("", &cookies));

        debug!(
            bearer = bearer_token.is_some(),
            bearer_source,
            refresh = refresh_token.is_some(),
            cookies = cookies.len(),
            "Resolved auth context"
        );

        Self::new(bearer_token, refresh_token, cookies)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("bearer_token", &self.bearer().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh().map(|_| "<redacted>"))
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

// ============================================================================
// Auth Sources
// ============================================================================

/// Raw credential inputs for [`AuthContext::resolve`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthSources<'a> {
    /// Raw token given explicitly (flag or environment).
    pub token: Option<&'a str>,
    /// Raw refresh token given explicitly.
    pub refresh_token: Option<&'a str>,
    /// Cookie headers given explicitly.
    pub cookies: &'a [String],
    /// Credentials loaded from the profile store.
    pub profile: Option<&'a Credentials>,
}

// ============================================================================
// Rotated Tokens
// ============================================================================

/// Tokens returned by a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RotatedTokens {
    /// New bearer token.
    pub access_token: String,
    /// New refresh token, when the server rotated it.
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RotatedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotatedTokens")
            .field("refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
