//! Menu command - a venue's items.

use anyhow::Result;
use basketeer_core::payload::as_id;
use basketeer_core::{ResolvedItem, Warnings};
use basketeer_fetch::load_menu;
use clap::Args;

use super::session::Session;
use crate::Cli;
use crate::output::{MenuOutput, emit, print_warnings};

/// Arguments for the menu command.
#[derive(Args)]
pub struct MenuArgs {
    /// Venue slug.
    pub venue: String,

    /// Stop once this many items are known.
    #[arg(long, short)]
    pub limit: Option<usize>,
}

/// Runs the menu command.
pub async fn run(args: &MenuArgs, cli: &Cli) -> Result<()> {
    let (session, mut auth) = Session::open(cli).await?;
    let ctx = &session.ctx;
    let venue = args.venue.as_str();
    let limit = args.limit;

    let mut warnings = Warnings::new();
    let (menu, loader_warnings) = session
        .invoke(&mut auth, &mut warnings, |auth| async move {
            let mut warnings = Warnings::new();
            let menu = load_menu(ctx, venue, &auth, limit, &mut warnings).await?;
            Ok((menu, warnings))
        })
        .await?;
    warnings.extend(loader_warnings);

    let mut items: Vec<ResolvedItem> = menu
        .items
        .iter()
        .filter_map(|payload| {
            let id = payload.get("id").and_then(as_id)?;
            Some(ResolvedItem::from_payload(id, payload))
        })
        .collect();
    if let Some(limit) = limit {
        items.truncate(limit);
    }

    let output = MenuOutput {
        venue: args.venue.clone(),
        from_categories: menu.from_categories,
        items,
        warnings: warnings.clone(),
    };
    emit(cli, &output, |f, o| f.format_menu(o))?;
    print_warnings(cli, &warnings);
    Ok(())
}
