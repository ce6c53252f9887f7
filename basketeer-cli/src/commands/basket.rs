//! Basket command - list and remove baskets.

use anyhow::Result;
use basketeer_core::Warnings;
use basketeer_fetch::{list_baskets, remove_from_basket};
use clap::{Args, Subcommand};

use super::session::Session;
use crate::Cli;
use crate::output::{BasketsOutput, RemovedOutput, emit, print_warnings};

/// Arguments for the basket command.
#[derive(Args)]
pub struct BasketArgs {
    #[command(subcommand)]
    pub action: BasketAction,
}

/// Basket subcommands.
#[derive(Subcommand)]
pub enum BasketAction {
    /// List baskets.
    List,

    /// Remove a basket, or its only item.
    Remove {
        /// Basket identifier.
        basket_id: String,

        /// Item to remove instead of the whole basket.
        #[arg(long)]
        item: Option<String>,
    },
}

/// Runs the basket command.
pub async fn run(args: &BasketArgs, cli: &Cli) -> Result<()> {
    let (session, mut auth) = Session::open(cli).await?;
    let ctx = &session.ctx;
    let mut warnings = Warnings::new();

    match &args.action {
        BasketAction::List => {
            let baskets = session
                .invoke(&mut auth, &mut warnings, |auth| async move {
                    list_baskets(ctx, &auth).await
                })
                .await?;
            emit(cli, &BasketsOutput { baskets }, |f, o| f.format_baskets(&o.baskets))?;
        }
        BasketAction::Remove { basket_id, item } => {
            let item = item.as_deref();
            let removed = session
                .invoke(&mut auth, &mut warnings, |auth| async move {
                    remove_from_basket(ctx, &auth, basket_id, item).await
                })
                .await?;
            emit(cli, &RemovedOutput { removed }, |f, o| f.format_removed(&o.removed))?;
        }
    }

    print_warnings(cli, &warnings);
    Ok(())
}
