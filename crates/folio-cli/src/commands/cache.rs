//! Cache inspection and maintenance: `keys`, `evict`, `clear`, `usage`

use anyhow::Result;
use colored::Colorize;
use folio_core::StorageEstimate;
use serde_json::json;

use crate::context::App;
use crate::output::{OutputFormat, print_json};

/// List cached keys in page order.
pub async fn keys(app: &App, format: OutputFormat) -> Result<()> {
    let keys: Vec<String> = app
        .store
        .list_keys()
        .await?
        .into_iter()
        .map(|key| key.to_string())
        .collect();

    match format {
        OutputFormat::Json => print_json(&json!({
            "count": keys.len(),
            "totalPages": app.config.document.total_pages,
            "keys": keys,
        }))?,
        OutputFormat::Text => {
            for key in &keys {
                println!("{key}");
            }
        },
    }
    Ok(())
}

/// Run one eviction pass.
pub async fn evict(app: &App, fraction: f64, format: OutputFormat) -> Result<()> {
    let removed = app.store.evict_fraction(fraction).await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "fraction": fraction, "removed": removed }))?,
        OutputFormat::Text => println!("{} Evicted {removed} entries", "✓".green()),
    }
    Ok(())
}

/// Remove every cached page.
pub async fn clear(app: &App, format: OutputFormat) -> Result<()> {
    let removed = app.store.clear().await?;
    match format {
        OutputFormat::Json => print_json(&json!({ "removed": removed }))?,
        OutputFormat::Text if removed == 0 => println!("{} Cache is already empty", "ℹ".blue()),
        OutputFormat::Text => println!("{} Cleared {removed} cached pages", "✓".green()),
    }
    Ok(())
}

/// Show entry count and the storage estimate.
pub async fn usage(app: &App, format: OutputFormat) -> Result<()> {
    let entries = app.store.list_keys().await?.len();
    let estimate = app.store.estimate().await?;
    let high_water = app.config.prefetch.high_water;

    match format {
        OutputFormat::Json => print_json(&json!({
            "entries": entries,
            "totalPages": app.config.document.total_pages,
            "usage": estimate.map(|e| e.usage),
            "quota": estimate.map(|e| e.quota),
            "ratio": estimate.map(|e| e.ratio()),
            "aboveHighWater": estimate.map(|e| e.ratio() > high_water),
        }))?,
        OutputFormat::Text => {
            println!(
                "Cached pages: {entries}/{}",
                app.config.document.total_pages
            );
            match estimate {
                Some(estimate) => println!("Storage: {}", describe(&estimate, high_water)),
                None => println!("Storage: {}", "estimate unavailable".dimmed()),
            }
        },
    }
    Ok(())
}

fn describe(estimate: &StorageEstimate, high_water: f64) -> String {
    let percent = estimate.ratio() * 100.0;
    let line = format!(
        "{} of {} ({percent:.1}%)",
        human_bytes(estimate.usage),
        human_bytes(estimate.quota)
    );
    if estimate.ratio() > high_water {
        format!("{line} {}", "above high-water mark".yellow())
    } else {
        line
    }
}

#[allow(clippy::cast_precision_loss)]
fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
