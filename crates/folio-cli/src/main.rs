//! folio CLI - cached, prefetching page viewer
//!
//! This is the main entry point for the folio command-line interface.
//! Command implementations live in [`commands`]; this file only parses flags,
//! sets up logging and dispatches.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod context;
mod output;
mod utils;

use cli::{Cli, Commands};
use context::{App, resolve_config};
use utils::logging::initialize_logging;

// One cooperative thread: interactive loads and prefetch batches interleave as futures
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    execute_command(&cli).await
}

async fn execute_command(cli: &Cli) -> Result<()> {
    // The table of contents only needs configuration; don't create the store for it
    if matches!(cli.command, Commands::Toc) {
        return commands::show_toc(&resolve_config(cli)?, cli.format);
    }
    let app = App::open(cli)?;
    dispatch(&app, cli).await
}

async fn dispatch(app: &App, cli: &Cli) -> Result<()> {
    let format = cli.format;
    match &cli.command {
        Commands::Page { number, out } => {
            commands::load_page(app, *number, out.as_deref(), format).await
        },
        Commands::Prefetch => commands::prefetch(app, format, cli.quiet).await,
        Commands::Keys => commands::keys(app, format).await,
        Commands::Evict { fraction } => commands::evict(app, *fraction, format).await,
        Commands::Clear => commands::clear(app, format).await,
        Commands::Usage => commands::usage(app, format).await,
        Commands::Toc => commands::show_toc(&app.config, format),
        Commands::View { start, moves } => commands::view(app, *start, moves, format).await,
    }
}
