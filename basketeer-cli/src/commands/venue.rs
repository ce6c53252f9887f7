//! Venue command.

use anyhow::Result;
use basketeer_core::Warnings;
use basketeer_fetch::resolve_venue;
use clap::Args;

use super::session::Session;
use crate::Cli;
use crate::output::{SourceOutput, VenueOutput, emit, print_warnings};

/// Arguments for the venue command.
#[derive(Args)]
pub struct VenueArgs {
    /// Venue slug.
    pub slug: String,
}

/// Runs the venue command.
pub async fn run(args: &VenueArgs, cli: &Cli) -> Result<()> {
    let (session, mut auth) = Session::open(cli).await?;
    let ctx = &session.ctx;
    let slug = args.slug.as_str();

    let mut warnings = Warnings::new();
    let resolution = session
        .invoke(&mut auth, &mut warnings, |auth| async move {
            resolve_venue(ctx, &auth, slug).await
        })
        .await?;
    warnings.extend(resolution.warnings);

    let output = VenueOutput {
        value: resolution.value,
        complete: resolution.complete,
        sources: resolution.attempts.iter().map(SourceOutput::from).collect(),
        warnings: warnings.clone(),
    };
    emit(cli, &output, |f, o| f.format_venue(o))?;
    print_warnings(cli, &warnings);
    Ok(())
}
