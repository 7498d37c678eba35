//! Output formatting for the `folio` CLI.
//!
//! Every command renders either human-readable text (default) or a single JSON
//! document on stdout. Progress and logs always go to stderr.

mod progress;

pub use progress::prefetch_bar;

use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty text output (default)
    Text,
    /// Single JSON document
    Json,
}

impl OutputFormat {
    /// Whether stdout carries machine-readable output.
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
