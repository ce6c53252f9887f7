// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! basketeer CLI - venues, menus and baskets from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Save credentials copied from a browser session
//! basketeer auth import 'Bearer eyJ...'
//!
//! # Show a venue's menu
//! basketeer menu pizzeria-napoli --limit 20
//!
//! # Resolve one item's price and options as JSON
//! basketeer item pizzeria-napoli 5f1e... --format json --pretty
//!
//! # List and remove baskets
//! basketeer basket list
//! basketeer basket remove 64a0...
//! ```

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use basketeer_fetch::FetchError;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{auth, basket, item, menu, venue};

// ============================================================================
// CLI Definition
// ============================================================================

/// basketeer CLI - delivery platform venues, menus and baskets.
#[derive(Parser)]
#[command(name = "basketeer")]
#[command(about = "Command-line client for delivery platform venues, menus and baskets")]
#[command(long_about = r#"
basketeer reads venues, menus and items from a food delivery platform and
manages the signed-in user's baskets.

Credentials come from, in order: --token/--refresh-token/--cookie (or the
BASKETEER_TOKEN, BASKETEER_REFRESH_TOKEN, BASKETEER_COOKIE variables), the
saved profile, and tokens embedded in cookies.

Examples:
  basketeer auth import 'Bearer eyJ...'    # Save credentials
  basketeer menu pizzeria-napoli           # Venue menu
  basketeer item pizzeria-napoli <id>      # Item price and options
  basketeer basket list --format json      # Baskets as JSON
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format.
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (no logs, no warnings).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Access token in any supported encoding.
    #[arg(long, env = "BASKETEER_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Refresh token.
    #[arg(long, env = "BASKETEER_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Cookie header to forward (repeatable).
    #[arg(long = "cookie", env = "BASKETEER_COOKIE", global = true, hide_env_values = true)]
    pub cookies: Vec<String>,

    /// Language for localized content (overrides settings).
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Credential profile file (overrides the configured backend).
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Inspect, refresh or import credentials.
    Auth(auth::AuthArgs),

    /// Show a venue's menu.
    #[command(visible_alias = "m")]
    Menu(menu::MenuArgs),

    /// Resolve one item's name, price and options.
    #[command(visible_alias = "i")]
    Item(item::ItemArgs),

    /// Show venue information.
    #[command(visible_alias = "v")]
    Venue(venue::VenueArgs),

    /// List or remove baskets.
    #[command(visible_alias = "b")]
    Basket(basket::BasketArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
    /// YAML output.
    Yaml,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// General error.
    Error = 1,
    /// Venue, item or basket not found.
    NotFound = 2,
    /// Missing or rejected credentials.
    Unauthorized = 3,
    /// Operation the upstream API cannot perform.
    Unsupported = 4,
    /// Interrupted.
    Cancelled = 130,
}

impl ExitCode {
    /// Maps a command failure to an exit code.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<FetchError>() {
            Some(e) if e.is_not_found() || e.status() == Some(404) => Self::NotFound,
            Some(e) if e.is_unauthorized() => Self::Unauthorized,
            Some(FetchError::MissingCredentials(_)) => Self::Unauthorized,
            Some(FetchError::Unsupported(_)) => Self::Unsupported,
            Some(FetchError::Cancelled) => Self::Cancelled,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("basketeer=debug,info")
    } else {
        EnvFilter::new("basketeer=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Auth(args) => auth::run(args, &cli).await,
        Commands::Menu(args) => menu::run(args, &cli).await,
        Commands::Item(args) => item::run(args, &cli).await,
        Commands::Venue(args) => venue::run(args, &cli).await,
        Commands::Basket(args) => basket::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
