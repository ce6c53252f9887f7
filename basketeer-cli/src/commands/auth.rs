//! Auth command - inspect, refresh and import credentials.

use anyhow::{Result, bail};
use basketeer_core::Warnings;
use basketeer_fetch::{AuthContext, AuthSources};
use chrono::Utc;
use clap::{Args, Subcommand};
use tracing::info;

use super::session::{Session, TokenSource};
use crate::Cli;
use crate::output::{AuthStatusOutput, emit, print_warnings};

/// Arguments for the auth command.
#[derive(Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Auth subcommands.
#[derive(Subcommand)]
pub enum AuthAction {
    /// Show where credentials come from and when the token expires.
    Status,

    /// Refresh the access token now and save it.
    Refresh,

    /// Normalize a raw token (JWT, Bearer header, JSON, cookie value) and save it.
    Import {
        /// Raw credential string.
        raw: String,
    },
}

/// Runs the auth command.
pub async fn run(args: &AuthArgs, cli: &Cli) -> Result<()> {
    let (session, mut auth) = Session::open(cli).await?;

    match &args.action {
        AuthAction::Status => {
            let status = status(&session, &auth, session.token_source);
            emit(cli, &status, |f, o| f.format_auth_status(o))?;
        }
        AuthAction::Refresh => {
            if auth.refresh().is_none() {
                bail!("no refresh token available; import credentials or pass --refresh-token");
            }
            let mut warnings = Warnings::new();
            session.rotate(&mut auth, &mut warnings).await?;
            info!(store = %session.store_location, "Credentials refreshed");

            let status = status(&session, &auth, session.token_source);
            emit(cli, &status, |f, o| f.format_auth_status(o))?;
            print_warnings(cli, &warnings);
        }
        AuthAction::Import { raw } => {
            let imported = AuthContext::resolve(&AuthSources {
                token: Some(raw.as_str()),
                refresh_token: cli.refresh_token.as_deref(),
                cookies: &cli.cookies,
                profile: None,
            });
            if !imported.has_credentials() {
                bail!("no credentials found in the given value");
            }
            session.store.save(&imported.to_credentials()).await?;
            info!(store = %session.store_location, "Credentials imported");

            let status = status(&session, &imported, TokenSource::Profile);
            emit(cli, &status, |f, o| f.format_auth_status(o))?;
        }
    }
    Ok(())
}

fn status(session: &Session, auth: &AuthContext, source: TokenSource) -> AuthStatusOutput {
    let expires_at = auth.expires_at();
    AuthStatusOutput {
        authenticated: auth.has_credentials(),
        token_source: source.label(),
        bearer_token: auth.bearer().is_some(),
        refresh_token: auth.refresh().is_some(),
        cookies: auth.cookies.len(),
        expires_at,
        expired: expires_at.is_some_and(|at| at <= Utc::now()),
        store: session.store_location.clone(),
    }
}
