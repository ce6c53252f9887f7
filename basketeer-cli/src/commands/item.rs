//! Item command - one item's price and options.

use anyhow::Result;
use basketeer_core::Warnings;
use basketeer_fetch::resolve_item;
use clap::Args;

use super::session::Session;
use crate::Cli;
use crate::output::{ItemOutput, SourceOutput, emit, print_warnings};

/// Arguments for the item command.
#[derive(Args)]
pub struct ItemArgs {
    /// Venue slug.
    pub venue: String,

    /// Item identifier.
    pub item_id: String,
}

/// Runs the item command.
pub async fn run(args: &ItemArgs, cli: &Cli) -> Result<()> {
    let (session, mut auth) = Session::open(cli).await?;
    let ctx = &session.ctx;
    let venue = args.venue.as_str();
    let item_id = args.item_id.as_str();

    let mut warnings = Warnings::new();
    let resolution = session
        .invoke(&mut auth, &mut warnings, |auth| async move {
            resolve_item(ctx, &auth, venue, item_id).await
        })
        .await?;
    warnings.extend(resolution.warnings);

    let output = ItemOutput {
        value: resolution.value,
        complete: resolution.complete,
        sources: resolution.attempts.iter().map(SourceOutput::from).collect(),
        warnings: warnings.clone(),
    };
    emit(cli, &output, |f, o| f.format_item(o))?;
    print_warnings(cli, &warnings);
    Ok(())
}
