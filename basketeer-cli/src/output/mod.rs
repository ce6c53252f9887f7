//! Output formatting for CLI.

mod structured;
mod text;

use std::io::IsTerminal;

use anyhow::Result;
use basketeer_core::Warnings;
use serde::Serialize;

pub use structured::{
    AuthStatusOutput, BasketsOutput, ItemOutput, MenuOutput, RemovedOutput, SourceOutput,
    VenueOutput,
};

use structured::StructuredFormatter;
use text::TextFormatter;

use crate::{Cli, OutputFormat};

/// Prints `value` in the selected format; `text` renders the text form.
pub fn emit<T: Serialize>(
    cli: &Cli,
    value: &T,
    text: impl FnOnce(&TextFormatter, &T) -> String,
) -> Result<()> {
    let rendered = match cli.format {
        OutputFormat::Text => {
            let use_colors = !cli.no_color && std::io::stdout().is_terminal();
            text(&TextFormatter::new(use_colors), value)
        }
        OutputFormat::Json => StructuredFormatter::new(cli.pretty).json(value)?,
        OutputFormat::Yaml => StructuredFormatter::new(cli.pretty).yaml(value)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Prints warnings to stderr unless quiet.
pub fn print_warnings(cli: &Cli, warnings: &Warnings) {
    if cli.quiet {
        return;
    }
    for warning in warnings.iter() {
        eprintln!("warning: {warning}");
    }
}
