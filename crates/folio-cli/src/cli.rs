//! # CLI Structure and Argument Parsing
//!
//! The `folio` binary drives the page cache from a terminal: it loads single
//! pages, runs the background prefetch in the foreground with a progress bar,
//! inspects and trims the cache, and steps a viewport through a document.
//!
//! ## Usage Patterns
//!
//! ```bash
//! # Load page 5 into a file (cache first, then the origin)
//! folio --origin https://books.example.com page 5 --out page5.jpg
//!
//! # Fill the cache with every missing page
//! folio prefetch
//!
//! # Inspect and trim the cache
//! folio keys
//! folio usage
//! folio evict --fraction 0.25
//!
//! # Step through pages 1 → 2 → 3 → 17
//! folio view --moves n n g:17
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// Main CLI structure for the `folio` command
#[derive(Parser, Clone, Debug)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "folio - cached, prefetching page viewer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "FOLIO_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Origin serving `<origin>/scan/<n>.jpg`
    #[arg(long, global = true, env = "FOLIO_ORIGIN", value_name = "URL")]
    pub origin: Option<String>,

    /// Root directory of the page store
    #[arg(long, global = true, env = "FOLIO_DATA_DIR", value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Load one page, from the cache if present, else from the origin
    Page {
        /// 1-based page number
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        number: u64,

        /// Write the page image to this file
        #[arg(short, long, value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// Fetch and store every page missing from the cache
    Prefetch,

    /// List cached page keys in page order
    Keys,

    /// Remove a fraction of cached entries, taking keys in name order
    Evict {
        /// Fraction of entries to remove, in (0, 1]
        #[arg(long, default_value_t = 0.5)]
        fraction: f64,
    },

    /// Remove every cached page
    Clear,

    /// Show storage usage for the cache
    Usage,

    /// Show the table of contents
    Toc,

    /// Step the three-page viewport through navigation moves
    View {
        /// 1-based page to start on
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        start: u64,

        /// Moves to apply in order: `n` (next), `p` (previous), `g:<page>` (go to)
        #[arg(long, num_args = 1.., value_name = "MOVE")]
        moves: Vec<Move>,
    },
}

/// One navigation step for `folio view`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    /// Advance one page
    Next,
    /// Go back one page
    Previous,
    /// 1-based page number
    GoTo(usize),
}

impl FromStr for Move {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "n" | "next" => Ok(Self::Next),
            "p" | "prev" | "previous" => Ok(Self::Previous),
            other => {
                let page = other
                    .strip_prefix("g:")
                    .ok_or_else(|| format!("unknown move '{other}' (expected n, p or g:<page>)"))?;
                match page.parse::<usize>() {
                    Ok(number) if number > 0 => Ok(Self::GoTo(number)),
                    _ => Err(format!("invalid page in '{other}'")),
                }
            },
        }
    }
}
