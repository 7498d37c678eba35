//! Foreground prefetch with a progress bar

use anyhow::Result;
use colored::Colorize;
use folio_core::PrefetchReport;
use serde_json::json;

use crate::context::App;
use crate::output::{OutputFormat, prefetch_bar, print_json};

/// Fetch every page missing from the cache and print the report.
pub async fn execute(app: &App, format: OutputFormat, quiet: bool) -> Result<()> {
    let bar = prefetch_bar(!quiet && !format.is_machine());
    let progress = bar.clone();

    let report = app
        .prefetcher()?
        .with_progress(move |completed, total| {
            progress.set_length(total as u64);
            progress.set_position(completed as u64);
        })
        .run()
        .await;
    bar.finish_and_clear();

    match format {
        OutputFormat::Json => print_json(&report_json(&report))?,
        OutputFormat::Text => print_report(&report, app.config.document.total_pages),
    }
    Ok(())
}

fn report_json(report: &PrefetchReport) -> serde_json::Value {
    json!({
        "gap": report.gap,
        "stored": report.stored,
        "failed": report.failed,
        "batches": report.batches,
        "evicted": report.evicted,
        "complete": report.is_complete(),
    })
}

fn print_report(report: &PrefetchReport, total_pages: usize) {
    if report.evicted > 0 {
        println!(
            "{} Storage above high-water mark: evicted {} entries",
            "⚠".yellow(),
            report.evicted
        );
    }
    if report.gap == 0 {
        println!("{} All {total_pages} pages already cached", "ℹ".blue());
        return;
    }

    let mark = if report.is_complete() { "✓".green() } else { "⚠".yellow() };
    println!(
        "{mark} Prefetched {}/{} missing pages in {} batches",
        report.stored, report.gap, report.batches
    );
    if report.failed > 0 {
        println!("  {} pages failed; run `folio prefetch` again to retry", report.failed);
    }
}
