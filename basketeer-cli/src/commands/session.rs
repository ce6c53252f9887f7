//! Per-command setup: settings, credentials and the fetch context.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use basketeer_core::{Credentials, ProfileStore, Warnings};
use basketeer_fetch::{
    AuthContext, AuthRotation, AuthSources, FetchContext, FetchError, UpstreamRefresher,
};
use basketeer_store::{Settings, default_settings_path, describe_backend, open_profile_store};
use basketeer_upstream::HttpUpstream;
use tracing::{debug, warn};

use crate::Cli;

/// Where the bearer token of a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `--token` or `BASKETEER_TOKEN`.
    Flag,
    /// The saved profile.
    Profile,
    /// Extracted from a cookie header.
    Cookies,
    /// No bearer token.
    None,
}

impl TokenSource {
    fn detect(cli: &Cli, profile: Option<&Credentials>, auth: &AuthContext) -> Self {
        let present = |s: Option<&str>| s.is_some_and(|s| !s.trim().is_empty());
        if present(cli.token.as_deref()) {
            Self::Flag
        } else if present(profile.and_then(|p| p.access_token.as_deref())) {
            Self::Profile
        } else if auth.bearer().is_some() {
            Self::Cookies
        } else {
            Self::None
        }
    }

    /// Short label for output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Profile => "profile",
            Self::Cookies => "cookies",
            Self::None => "none",
        }
    }
}

/// Everything a command needs besides its credentials.
pub struct Session {
    /// Upstream access and settings.
    pub ctx: FetchContext,
    /// Credential store rotated tokens are saved to.
    pub store: Box<dyn ProfileStore>,
    /// Human-readable location of the store.
    pub store_location: String,
    /// Where the bearer token came from.
    pub token_source: TokenSource,
}

impl Session {
    /// Loads settings and credentials and builds the upstream client.
    ///
    /// The credentials are returned separately so commands can hand them to
    /// [`Session::invoke`] mutably while borrowing the session.
    pub async fn open(cli: &Cli) -> Result<(Self, AuthContext)> {
        let settings_path = default_settings_path();
        let settings = Settings::load(&settings_path)
            .await
            .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;

        let store = open_profile_store(settings.credential_backend, cli.profile.as_deref());
        let store_location = describe_backend(settings.credential_backend, cli.profile.as_deref());
        let profile = match store.load().await {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                warn!(store = %store_location, error = %e, "Failed to load credential profile");
                None
            }
        };

        let auth = AuthContext::resolve(&AuthSources {
            token: cli.token.as_deref(),
            refresh_token: cli.refresh_token.as_deref(),
            cookies: &cli.cookies,
            profile: profile.as_ref(),
        });
        let token_source = TokenSource::detect(cli, profile.as_ref(), &auth);

        let upstream = HttpUpstream::with_endpoints(settings.endpoints.clone(), settings.timeout())?;
        let mut fetch_settings = settings.fetch_settings();
        if let Some(language) = &cli.language {
            fetch_settings.language.clone_from(language);
        }
        let ctx = FetchContext::builder(Arc::new(upstream))
            .settings(fetch_settings)
            .build();

        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted, cancelling");
                cancel.cancel();
            }
        });

        Ok((
            Self {
                ctx,
                store,
                store_location,
                token_source,
            },
            auth,
        ))
    }

    fn rotation<'a>(&'a self, refresher: &'a UpstreamRefresher<'a>) -> AuthRotation<'a> {
        AuthRotation::new(refresher)
            .with_store(self.store.as_ref())
            .with_leeway(self.ctx.settings.refresh_leeway)
            .with_cancel(self.ctx.cancel.clone())
    }

    /// Runs `op` with automatic token refresh.
    pub async fn invoke<T, F, Fut>(
        &self,
        auth: &mut AuthContext,
        warnings: &mut Warnings,
        op: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(AuthContext) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let refresher = UpstreamRefresher::new(self.ctx.api.as_ref());
        self.rotation(&refresher).invoke(auth, warnings, op).await
    }

    /// Refreshes the tokens now and saves them.
    pub async fn rotate(
        &self,
        auth: &mut AuthContext,
        warnings: &mut Warnings,
    ) -> Result<(), FetchError> {
        let refresher = UpstreamRefresher::new(self.ctx.api.as_ref());
        self.rotation(&refresher).rotate(auth, warnings).await
    }
}
